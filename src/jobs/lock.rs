use crate::db;
use crate::errors::BridgeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;

/// Fleet-wide claim on one tick of a job.
///
/// A tick is granted at most once across the fleet, and only once the claim
/// on the previous tick was released or has expired. Released ticks stay
/// consumed.
#[async_trait]
pub trait Locker: Send + Sync {
    /// Fails with [`ErrorKind::LockContention`](crate::errors::ErrorKind::LockContention)
    /// when the tick is already claimed or an earlier claim is still live.
    async fn try_lock(
        &self,
        job_name: &str,
        tick: DateTime<Utc>,
        lease: Duration,
    ) -> Result<(), BridgeError>;

    async fn unlock(&self, job_name: &str, tick: DateTime<Utc>) -> Result<(), BridgeError>;
}

/// Always grants the lock. Used when instances share no database.
pub struct NoopLocker;

#[async_trait]
impl Locker for NoopLocker {
    async fn try_lock(
        &self,
        _job_name: &str,
        _tick: DateTime<Utc>,
        _lease: Duration,
    ) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn unlock(&self, _job_name: &str, _tick: DateTime<Utc>) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Claims stored in the `job_locks` table, one row per job. Lease expiry is
/// judged by the database clock. A claim that is never released (crashed
/// holder) lets the next tick through once its lease runs out.
pub struct PgLocker {
    pool: PgPool,
    holder: String,
}

impl PgLocker {
    pub fn new(pool: PgPool, holder: impl Into<String>) -> Self {
        Self {
            pool,
            holder: holder.into(),
        }
    }
}

#[async_trait]
impl Locker for PgLocker {
    async fn try_lock(
        &self,
        job_name: &str,
        tick: DateTime<Utc>,
        lease: Duration,
    ) -> Result<(), BridgeError> {
        let claimed = db::job_lock::try_acquire(&self.pool, job_name, &self.holder, tick, lease)
            .await
            .map_err(|err| BridgeError::persistence(format!("could not lock job '{}'", job_name), err))?;
        if claimed {
            Ok(())
        } else {
            Err(BridgeError::lock_contention(job_name))
        }
    }

    async fn unlock(&self, job_name: &str, tick: DateTime<Utc>) -> Result<(), BridgeError> {
        db::job_lock::release(&self.pool, job_name, &self.holder, tick)
            .await
            .map_err(|err| BridgeError::persistence(format!("could not unlock job '{}'", job_name), err))
    }
}
