use crate::jobs::recorder::JobRun;
use sqlx::PgPool;
use tracing::Instrument;

pub async fn insert(pool: &PgPool, run: &JobRun) -> Result<(), String> {
    let query_span = tracing::info_span!("Saving job run", job = %run.job_name);
    sqlx::query(
        r#"
        INSERT INTO job_runs (
            id,
            job_name,
            component_name,
            component_id,
            status,
            message,
            scheduled_at,
            started_at,
            finished_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(run.id)
    .bind(&run.job_name)
    .bind(&run.component_name)
    .bind(&run.component_id)
    .bind(run.status.as_str())
    .bind(&run.message)
    .bind(run.scheduled_at)
    .bind(run.started_at)
    .bind(run.finished_at)
    .execute(pool)
    .instrument(query_span)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Failed to save job run: {:?}", err);
        format!("could not save job run: {}", err)
    })
}

pub async fn fetch_latest(pool: &PgPool, job_name: &str, limit: i64) -> Result<Vec<JobRun>, String> {
    let query_span = tracing::info_span!("Fetch latest job runs", job = job_name);
    sqlx::query_as::<_, JobRun>(
        r#"
        SELECT
            id,
            job_name,
            component_name,
            component_id,
            status,
            message,
            scheduled_at,
            started_at,
            finished_at
        FROM job_runs
        WHERE job_name = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(job_name)
    .bind(limit)
    .fetch_all(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch job runs: {:?}", err);
        format!("could not fetch job runs: {}", err)
    })
}
