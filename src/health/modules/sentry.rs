use crate::connectors::{ConnectorError, ErrorTracker};
use crate::errors::BridgeError;
use crate::health::models::Report;
use crate::health::HealthCheckModule;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CAPTURE: &str = "capture";
const PROBE_MESSAGE: &str = "elasticsearch-bridge health check";

pub struct SentryModule {
    tracker: Option<Arc<dyn ErrorTracker>>,
    timeout: Duration,
}

impl SentryModule {
    pub fn new(tracker: Arc<dyn ErrorTracker>, timeout: Duration) -> Self {
        Self {
            tracker: Some(tracker),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            tracker: None,
            timeout: Duration::ZERO,
        }
    }
}

#[async_trait]
impl HealthCheckModule for SentryModule {
    #[tracing::instrument(name = "Sentry health checks", skip(self))]
    async fn health_checks(&self) -> Vec<Report> {
        let tracker = match &self.tracker {
            Some(tracker) => tracker,
            None => return vec![Report::deactivated(CAPTURE)],
        };

        let start = Instant::now();
        let result = match timeout(self.timeout, tracker.capture_message(PROBE_MESSAGE)).await {
            Ok(result) => result,
            Err(elapsed) => Err(ConnectorError::from(elapsed)),
        };
        let duration = start.elapsed();

        let report = match result {
            Ok(event_id) => {
                tracing::debug!(event_id = %event_id, "sentry accepted probe event");
                Report::ok(CAPTURE, duration)
            }
            Err(err) => {
                let err = BridgeError::probe("could not send event to sentry", err);
                tracing::warn!("{}", err);
                Report::ko(CAPTURE, duration, err)
            }
        };
        vec![report]
    }
}
