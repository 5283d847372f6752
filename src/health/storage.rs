use super::models::{Report, StoredReport};
use crate::db;
use crate::errors::BridgeError;
use crate::identity::ComponentIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Last known reports per monitored unit.
///
/// `read` returns a row even after its `valid_until` has passed; callers check
/// [`StoredReport::is_stale`]. Expired rows only go away through `clean`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Upserts the row for `unit`, valid for `validity` from now. Failed
    /// reports are stored like any other.
    async fn update(&self, unit: &str, validity: Duration, reports: &[Report])
        -> Result<(), BridgeError>;

    async fn read(&self, unit: &str) -> Result<Option<StoredReport>, BridgeError>;

    /// Deletes expired rows, returning how many were removed.
    async fn clean(&self) -> Result<u64, BridgeError>;
}

fn snapshot(
    identity: &(String, String),
    unit: &str,
    validity: Duration,
    reports: &[Report],
    now: DateTime<Utc>,
) -> Result<StoredReport, BridgeError> {
    let context = || format!("could not update reports for '{}'", unit);
    let validity = chrono::Duration::from_std(validity)
        .map_err(|err| BridgeError::persistence(context(), err))?;
    let valid_until = now
        .checked_add_signed(validity)
        .ok_or_else(|| BridgeError::persistence(context(), "validity out of range"))?;
    let reports = serde_json::to_value(reports).map_err(|err| BridgeError::persistence(context(), err))?;

    Ok(StoredReport {
        component_name: identity.0.clone(),
        component_id: identity.1.clone(),
        healthcheck_unit: unit.to_string(),
        reports,
        last_updated: now,
        valid_until,
    })
}

/// Postgres backed store, one row per `(component_name, healthcheck_unit)`.
pub struct PgReportStore {
    pool: PgPool,
    component: (String, String),
}

impl PgReportStore {
    pub fn new(pool: PgPool, identity: &ComponentIdentity) -> Self {
        Self {
            pool,
            component: (identity.name.clone(), identity.id.clone()),
        }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn update(
        &self,
        unit: &str,
        validity: Duration,
        reports: &[Report],
    ) -> Result<(), BridgeError> {
        let row = snapshot(&self.component, unit, validity, reports, Utc::now())?;
        db::health_report::upsert(&self.pool, &row)
            .await
            .map_err(|err| BridgeError::persistence(format!("could not update reports for '{}'", unit), err))
    }

    async fn read(&self, unit: &str) -> Result<Option<StoredReport>, BridgeError> {
        db::health_report::fetch(&self.pool, &self.component.0, unit)
            .await
            .map_err(|err| BridgeError::persistence(format!("could not read reports for '{}'", unit), err))
    }

    async fn clean(&self) -> Result<u64, BridgeError> {
        db::health_report::delete_expired(&self.pool, Utc::now())
            .await
            .map_err(|err| BridgeError::persistence("could not clean health reports", err))
    }
}

/// Process-local store used when no database is configured.
pub struct MemoryReportStore {
    component: (String, String),
    rows: RwLock<HashMap<String, StoredReport>>,
}

impl MemoryReportStore {
    pub fn new(identity: &ComponentIdentity) -> Self {
        Self {
            component: (identity.name.clone(), identity.id.clone()),
            rows: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn update(
        &self,
        unit: &str,
        validity: Duration,
        reports: &[Report],
    ) -> Result<(), BridgeError> {
        let row = snapshot(&self.component, unit, validity, reports, Utc::now())?;
        self.rows.write().await.insert(unit.to_string(), row);
        Ok(())
    }

    async fn read(&self, unit: &str) -> Result<Option<StoredReport>, BridgeError> {
        Ok(self.rows.read().await.get(unit).cloned())
    }

    async fn clean(&self) -> Result<u64, BridgeError> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| !row.is_stale(now));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::models::Status;

    fn identity() -> ComponentIdentity {
        ComponentIdentity::new("elasticsearch-bridge", "000-000-000-00", "test", "abc")
    }

    #[tokio::test]
    async fn update_overwrites_previous_row() {
        let store = MemoryReportStore::new(&identity());
        store
            .update("redis", Duration::from_secs(60), &[Report::ok("ping", Duration::from_millis(2))])
            .await
            .unwrap();
        store
            .update(
                "redis",
                Duration::from_secs(60),
                &[Report::ko("ping", Duration::from_millis(2), "could not ping redis")],
            )
            .await
            .unwrap();

        let stored = store.read("redis").await.unwrap().unwrap();
        assert_eq!(stored.component_name, "elasticsearch-bridge");
        assert_eq!(stored.component_id, "000-000-000-00");
        assert_eq!(stored.healthcheck_unit, "redis");
        assert_eq!(stored.status(), Status::Ko);
    }

    #[tokio::test]
    async fn missing_unit_reads_as_none() {
        let store = MemoryReportStore::new(&identity());
        assert!(store.read("jaeger").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_row_is_returned_until_cleaned() {
        let store = MemoryReportStore::new(&identity());
        store
            .update("sentry", Duration::ZERO, &[Report::deactivated("capture")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let stored = store.read("sentry").await.unwrap().unwrap();
        assert!(stored.is_stale(Utc::now()));

        assert_eq!(store.clean().await.unwrap(), 1);
        assert!(store.read("sentry").await.unwrap().is_none());
    }

    #[test]
    fn snapshot_rejects_out_of_range_validity() {
        let component = ("elasticsearch-bridge".to_string(), "1".to_string());
        let err = snapshot(&component, "flaki", Duration::MAX, &[], Utc::now()).unwrap_err();

        assert_eq!(err.kind(), crate::errors::ErrorKind::PersistenceFailure);
    }
}
