use super::job::{Job, Payload};
use crate::errors::BridgeError;
use crate::health::storage::ReportStore;
use crate::health::HealthCheckModule;
use std::sync::Arc;
use std::time::Duration;

pub const CLEAN_JOB: &str = "clean";

/// Probes one unit, then stores the reports with the given validity.
///
/// The job is named after the unit. Its output is the list of reports that
/// were stored.
pub fn exec_and_persist(
    unit: &str,
    module: Arc<dyn HealthCheckModule>,
    store: Arc<dyn ReportStore>,
    validity: Duration,
) -> Job {
    let unit_name = unit.to_string();
    Job::new(unit)
        .step(move |_, _| {
            let module = module.clone();
            async move { Ok::<_, BridgeError>(Payload::Reports(module.health_checks().await)) }
        })
        .step(move |_, input| {
            let store = store.clone();
            let unit = unit_name.clone();
            async move {
                let reports = match input {
                    Payload::Reports(reports) => reports,
                    other => {
                        return Err(BridgeError::persistence(
                            format!("could not store reports for '{}'", unit),
                            format!("unexpected step input {:?}", other),
                        ))
                    }
                };
                store.update(&unit, validity, &reports).await?;
                Ok::<_, BridgeError>(Payload::Reports(reports))
            }
        })
}

/// Deletes every stored report set whose validity has run out.
pub fn clean_store(store: Arc<dyn ReportStore>) -> Job {
    Job::new(CLEAN_JOB).step(move |_, _| {
        let store = store.clone();
        async move {
            tracing::info!(step = "clean", "cleaning expired health reports");
            let removed = store.clean().await?;
            Ok::<_, BridgeError>(Payload::Count(removed))
        }
    })
}
