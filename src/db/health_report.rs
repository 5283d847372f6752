use crate::health::models::StoredReport;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::Instrument;

pub async fn upsert(pool: &PgPool, report: &StoredReport) -> Result<(), String> {
    let query_span = tracing::info_span!(
        "Saving health reports into the database",
        unit = %report.healthcheck_unit
    );
    sqlx::query(
        r#"
        INSERT INTO health_reports (
            component_name,
            healthcheck_unit,
            component_id,
            reports,
            last_updated,
            valid_until
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (component_name, healthcheck_unit) DO UPDATE
        SET component_id = EXCLUDED.component_id,
            reports = EXCLUDED.reports,
            last_updated = EXCLUDED.last_updated,
            valid_until = EXCLUDED.valid_until
        "#,
    )
    .bind(&report.component_name)
    .bind(&report.healthcheck_unit)
    .bind(&report.component_id)
    .bind(&report.reports)
    .bind(report.last_updated)
    .bind(report.valid_until)
    .execute(pool)
    .instrument(query_span)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Failed to execute query: {:?}", err);
        format!("could not save health reports: {}", err)
    })
}

pub async fn fetch(
    pool: &PgPool,
    component_name: &str,
    unit: &str,
) -> Result<Option<StoredReport>, String> {
    let query_span = tracing::info_span!("Fetch stored health reports", unit = unit);
    sqlx::query_as::<_, StoredReport>(
        r#"
        SELECT
            component_id,
            component_name,
            healthcheck_unit,
            reports,
            last_updated,
            valid_until
        FROM health_reports
        WHERE component_name = $1
        AND healthcheck_unit = $2
        LIMIT 1
        "#,
    )
    .bind(component_name)
    .bind(unit)
    .fetch_optional(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch health reports, error: {:?}", err);
        format!("could not read health reports: {}", err)
    })
}

/// Removes every row whose validity window ended before `now`.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, String> {
    let query_span = tracing::info_span!("Delete expired health reports");
    sqlx::query(
        r#"
        DELETE FROM health_reports
        WHERE valid_until < $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .instrument(query_span)
    .await
    .map(|result| result.rows_affected())
    .map_err(|err| {
        tracing::error!("Failed to delete expired health reports: {:?}", err);
        format!("could not clean health reports: {}", err)
    })
}
