use crate::db;
use crate::errors::BridgeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job run status '{0}'")]
pub struct UnknownRunStatus(String);

impl TryFrom<String> for RunStatus {
    type Error = UnknownRunStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownRunStatus(value)),
        }
    }
}

/// Outcome of one scheduled execution.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobRun {
    pub id: uuid::Uuid,
    pub job_name: String,
    pub component_name: String,
    pub component_id: String,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
    pub message: Option<String>,
    /// Tick instant the run belongs to.
    pub scheduled_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobRunRecorder: Send + Sync {
    async fn record(&self, run: &JobRun) -> Result<(), BridgeError>;
}

pub struct PgJobRunRecorder {
    pool: PgPool,
}

impl PgJobRunRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRunRecorder for PgJobRunRecorder {
    async fn record(&self, run: &JobRun) -> Result<(), BridgeError> {
        db::job_run::insert(&self.pool, run)
            .await
            .map_err(|err| BridgeError::persistence(format!("could not record run of '{}'", run.job_name), err))
    }
}

/// Writes runs to the log only.
pub struct LogJobRunRecorder;

#[async_trait]
impl JobRunRecorder for LogJobRunRecorder {
    async fn record(&self, run: &JobRun) -> Result<(), BridgeError> {
        let took_ms = (run.finished_at - run.started_at).num_milliseconds();
        match run.status {
            RunStatus::Failed => tracing::warn!(
                job = %run.job_name,
                tick = %run.scheduled_at,
                status = run.status.as_str(),
                took_ms = took_ms,
                message = run.message.as_deref().unwrap_or_default(),
                "job run failed"
            ),
            _ => tracing::info!(
                job = %run.job_name,
                tick = %run.scheduled_at,
                status = run.status.as_str(),
                took_ms = took_ms,
                "job run finished"
            ),
        }
        Ok(())
    }
}
