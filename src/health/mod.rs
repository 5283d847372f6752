pub mod component;
pub mod duration;
pub mod models;
pub mod modules;
pub mod storage;

pub use component::{HealthComponent, HealthError};
pub use models::{aggregate, Report, Status, StoredReport};
pub use storage::{MemoryReportStore, PgReportStore, ReportStore};

use async_trait::async_trait;

pub const INFLUX: &str = "influx";
pub const JAEGER: &str = "jaeger";
pub const REDIS: &str = "redis";
pub const SENTRY: &str = "sentry";
pub const FLAKI: &str = "flaki";
pub const ELASTICSEARCH: &str = "elasticsearch";

/// Monitored units, in the order they are wired at startup.
pub const UNITS: [&str; 6] = [INFLUX, JAEGER, REDIS, SENTRY, FLAKI, ELASTICSEARCH];

/// Health checks of one dependency. Probe failures are reported, never
/// returned as errors.
#[async_trait]
pub trait HealthCheckModule: Send + Sync {
    async fn health_checks(&self) -> Vec<Report>;
}
