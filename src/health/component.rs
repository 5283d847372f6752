use super::models::{Report, Status, StoredReport};
use super::storage::ReportStore;
use super::HealthCheckModule;
use crate::errors::BridgeError;
use crate::jobs::health::exec_and_persist;
use crate::jobs::job::{Job, JobContext, JobError, Payload};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("unknown health check unit '{0}'")]
    UnknownUnit(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Job(#[from] JobError),
}

struct Unit {
    module: Arc<dyn HealthCheckModule>,
    validity: Duration,
}

/// The set of monitored units, and the single entry point for probing them
/// now or reading what was last stored.
pub struct HealthComponent {
    units: BTreeMap<String, Unit>,
    store: Arc<dyn ReportStore>,
}

impl HealthComponent {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self {
            units: BTreeMap::new(),
            store,
        }
    }

    pub fn with_unit(
        mut self,
        name: impl Into<String>,
        module: Arc<dyn HealthCheckModule>,
        validity: Duration,
    ) -> Self {
        self.units.insert(name.into(), Unit { module, validity });
        self
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn store(&self) -> Arc<dyn ReportStore> {
        self.store.clone()
    }

    fn unit(&self, name: &str) -> Result<&Unit, HealthError> {
        self.units
            .get(name)
            .ok_or_else(|| HealthError::UnknownUnit(name.to_string()))
    }

    /// Builds the exec-and-persist job of one unit, as scheduled and as run by
    /// [`HealthComponent::exec`].
    pub fn job(&self, name: &str) -> Result<Job, HealthError> {
        let unit = self.unit(name)?;
        Ok(exec_and_persist(
            name,
            unit.module.clone(),
            self.store.clone(),
            unit.validity,
        ))
    }

    /// Probes `name` right away and stores the outcome.
    #[tracing::instrument(name = "Execute health checks", skip(self))]
    pub async fn exec(&self, name: &str) -> Result<Vec<Report>, HealthError> {
        let job = self.job(name)?;
        let ctx = JobContext::new(name, CancellationToken::new());
        match job.run(&ctx).await? {
            Payload::Reports(reports) => Ok(reports),
            _ => Ok(Vec::new()),
        }
    }

    /// Last stored reports of `name`, without probing.
    #[tracing::instrument(name = "Read health checks", skip(self))]
    pub async fn read(&self, name: &str) -> Result<Option<StoredReport>, HealthError> {
        self.unit(name)?;
        Ok(self.store.read(name).await?)
    }

    /// Stored report sets of every unit that has one, keyed by unit name.
    /// A row whose reports cannot be decoded is left out.
    pub async fn all_health_checks(&self) -> Result<BTreeMap<String, Vec<Report>>, HealthError> {
        let mut all = BTreeMap::new();
        for name in self.units.keys() {
            let Some(stored) = self.store.read(name).await? else {
                continue;
            };
            match stored.parsed_reports() {
                Ok(reports) => {
                    all.insert(name.clone(), reports);
                }
                Err(err) => {
                    tracing::warn!(unit = %name, "could not decode stored reports: {}", err);
                }
            }
        }
        Ok(all)
    }

    /// Aggregated status of every unit. Units never stored, or whose stored
    /// reports cannot be decoded, are `Unknown`.
    pub async fn all_statuses(&self) -> Result<BTreeMap<String, Status>, HealthError> {
        let mut statuses = BTreeMap::new();
        for name in self.units.keys() {
            let status = self
                .store
                .read(name)
                .await?
                .map_or(Status::Unknown, |stored| stored.status());
            statuses.insert(name.clone(), status);
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::storage::MemoryReportStore;
    use crate::identity::ComponentIdentity;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModule {
        status: Status,
        calls: AtomicUsize,
    }

    impl CountingModule {
        fn new(status: Status) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthCheckModule for CountingModule {
        async fn health_checks(&self) -> Vec<Report> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![Report::new("ping", Duration::from_millis(1), self.status)]
        }
    }

    fn component(redis: Arc<CountingModule>, influx: Arc<CountingModule>) -> HealthComponent {
        let identity = ComponentIdentity::new("elasticsearch-bridge", "1", "test", "abc");
        HealthComponent::new(Arc::new(MemoryReportStore::new(&identity)))
            .with_unit("redis", redis, Duration::from_secs(60))
            .with_unit("influx", influx, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn exec_probes_and_persists() {
        let redis = CountingModule::new(Status::Degraded);
        let component = component(redis.clone(), CountingModule::new(Status::Ok));

        let reports = component.exec("redis").await.unwrap();

        assert_eq!(reports[0].status, Status::Degraded);
        assert_eq!(redis.calls.load(Ordering::SeqCst), 1);
        let stored = component.read("redis").await.unwrap().unwrap();
        assert_eq!(stored.parsed_reports().unwrap(), reports);
    }

    #[tokio::test]
    async fn read_never_probes() {
        let redis = CountingModule::new(Status::Ok);
        let component = component(redis.clone(), CountingModule::new(Status::Ok));

        assert!(component.read("redis").await.unwrap().is_none());
        assert_eq!(redis.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_unit_is_rejected() {
        let component = component(CountingModule::new(Status::Ok), CountingModule::new(Status::Ok));

        assert!(matches!(
            component.exec("cockroach").await,
            Err(HealthError::UnknownUnit(_))
        ));
        assert!(matches!(
            component.read("cockroach").await,
            Err(HealthError::UnknownUnit(_))
        ));
    }

    #[tokio::test]
    async fn combined_view_is_ordered_by_unit() {
        let component = component(CountingModule::new(Status::Ko), CountingModule::new(Status::Ok));
        component.exec("redis").await.unwrap();

        let all = component.all_health_checks().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["redis"]);

        component.exec("influx").await.unwrap();
        let statuses = component.all_statuses().await.unwrap();
        assert_eq!(
            statuses.into_iter().collect::<Vec<_>>(),
            vec![
                ("influx".to_string(), Status::Ok),
                ("redis".to_string(), Status::Ko)
            ]
        );
    }

    #[tokio::test]
    async fn units_without_reports_are_unknown() {
        let component = component(CountingModule::new(Status::Ok), CountingModule::new(Status::Ok));

        let statuses = component.all_statuses().await.unwrap();

        assert_eq!(statuses["redis"], Status::Unknown);
        assert_eq!(statuses["influx"], Status::Unknown);
    }

    /// Store holding one row with undecodable reports next to the rows the
    /// component writes.
    struct CorruptedStore {
        inner: MemoryReportStore,
        corrupted: String,
    }

    #[async_trait]
    impl ReportStore for CorruptedStore {
        async fn update(&self, unit: &str, validity: Duration, reports: &[Report]) -> Result<(), BridgeError> {
            self.inner.update(unit, validity, reports).await
        }

        async fn read(&self, unit: &str) -> Result<Option<StoredReport>, BridgeError> {
            if unit != self.corrupted {
                return self.inner.read(unit).await;
            }
            Ok(Some(StoredReport {
                component_id: "1".to_string(),
                component_name: "elasticsearch-bridge".to_string(),
                healthcheck_unit: unit.to_string(),
                reports: serde_json::json!({ "not": "a list" }),
                last_updated: Utc::now(),
                valid_until: Utc::now(),
            }))
        }

        async fn clean(&self) -> Result<u64, BridgeError> {
            self.inner.clean().await
        }
    }

    #[tokio::test]
    async fn undecodable_row_does_not_hide_other_units() {
        let identity = ComponentIdentity::new("elasticsearch-bridge", "1", "test", "abc");
        let store = CorruptedStore {
            inner: MemoryReportStore::new(&identity),
            corrupted: "influx".to_string(),
        };
        let component = HealthComponent::new(Arc::new(store))
            .with_unit("redis", CountingModule::new(Status::Degraded), Duration::from_secs(60))
            .with_unit("influx", CountingModule::new(Status::Ok), Duration::from_secs(60));
        component.exec("redis").await.unwrap();

        let statuses = component.all_statuses().await.unwrap();
        assert_eq!(statuses["influx"], Status::Unknown);
        assert_eq!(statuses["redis"], Status::Degraded);

        let all = component.all_health_checks().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["redis"]);
    }
}
