use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::Instrument;

/// Claims `tick` of `job_name` for `holder` during `lease`. The claim succeeds
/// only for a tick later than the last claimed one, once the previous lease
/// ended. Times are taken from the database clock.
pub async fn try_acquire(
    pool: &PgPool,
    job_name: &str,
    holder: &str,
    tick: DateTime<Utc>,
    lease: Duration,
) -> Result<bool, String> {
    let query_span = tracing::info_span!("Acquire job lock", job = job_name, holder = holder, %tick);
    sqlx::query_scalar::<_, String>(
        r#"
        INSERT INTO job_locks (job_name, holder, tick_at, acquired_at, expires_at)
        VALUES ($1, $2, $3, now(), now() + make_interval(secs => $4))
        ON CONFLICT (job_name) DO UPDATE
        SET holder = EXCLUDED.holder,
            tick_at = EXCLUDED.tick_at,
            acquired_at = EXCLUDED.acquired_at,
            expires_at = EXCLUDED.expires_at
        WHERE job_locks.tick_at < EXCLUDED.tick_at
        AND job_locks.expires_at <= EXCLUDED.acquired_at
        RETURNING job_name
        "#,
    )
    .bind(job_name)
    .bind(holder)
    .bind(tick)
    .bind(lease.as_secs_f64())
    .fetch_optional(pool)
    .instrument(query_span)
    .await
    .map(|row| row.is_some())
    .map_err(|err| {
        tracing::error!("Failed to acquire job lock: {:?}", err);
        format!("could not acquire lock for job '{}': {}", job_name, err)
    })
}

/// Ends the lease of `holder` on `tick` now. The row stays, so the tick
/// cannot be claimed again.
pub async fn release(
    pool: &PgPool,
    job_name: &str,
    holder: &str,
    tick: DateTime<Utc>,
) -> Result<(), String> {
    let query_span = tracing::info_span!("Release job lock", job = job_name, holder = holder, %tick);
    sqlx::query(
        r#"
        UPDATE job_locks
        SET expires_at = now()
        WHERE job_name = $1
        AND holder = $2
        AND tick_at = $3
        AND expires_at > now()
        "#,
    )
    .bind(job_name)
    .bind(holder)
    .bind(tick)
    .execute(pool)
    .instrument(query_span)
    .await
    .map(|_| ())
    .map_err(|err| {
        tracing::error!("Failed to release job lock: {:?}", err);
        format!("could not release lock for job '{}': {}", job_name, err)
    })
}
