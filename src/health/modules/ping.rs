use crate::connectors::{ConnectorError, Pinger};
use crate::errors::BridgeError;
use crate::health::models::Report;
use crate::health::HealthCheckModule;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Single ping-style probe, shared by the metrics store, the cache and the
/// tracing collector.
pub struct PingModule {
    unit: &'static str,
    probe: &'static str,
    pinger: Option<Arc<dyn Pinger>>,
    timeout: Duration,
}

impl PingModule {
    pub fn new(
        unit: &'static str,
        probe: &'static str,
        pinger: Arc<dyn Pinger>,
        timeout: Duration,
    ) -> Self {
        Self {
            unit,
            probe,
            pinger: Some(pinger),
            timeout,
        }
    }

    /// Module for a dependency switched off in the configuration. It never
    /// touches the network.
    pub fn disabled(unit: &'static str, probe: &'static str) -> Self {
        Self {
            unit,
            probe,
            pinger: None,
            timeout: Duration::ZERO,
        }
    }
}

#[async_trait]
impl HealthCheckModule for PingModule {
    #[tracing::instrument(name = "Ping health check", skip(self), fields(unit = self.unit))]
    async fn health_checks(&self) -> Vec<Report> {
        let pinger = match &self.pinger {
            Some(pinger) => pinger,
            None => return vec![Report::deactivated(self.probe)],
        };

        let start = Instant::now();
        let result = match timeout(self.timeout, pinger.ping()).await {
            Ok(result) => result,
            Err(elapsed) => Err(ConnectorError::from(elapsed)),
        };
        let duration = start.elapsed();

        let report = match result {
            Ok(()) => Report::ok(self.probe, duration),
            Err(err) => {
                let err = BridgeError::probe(format!("could not ping {}", self.unit), err);
                tracing::warn!("{}", err);
                Report::ko(self.probe, duration, err)
            }
        };
        vec![report]
    }
}
