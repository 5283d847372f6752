use crate::connectors::IdGenerator;
use crate::errors::BridgeError;
use crate::health::models::Report;
use crate::health::HealthCheckModule;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

const NEXT_VALID_ID: &str = "NextValidID";

/// Checks that the ID generator answers and keeps handing out fresh values.
pub struct FlakiModule {
    generator: Arc<dyn IdGenerator>,
}

impl FlakiModule {
    pub fn new(generator: Arc<dyn IdGenerator>) -> Self {
        Self { generator }
    }

    async fn two_ids(&self) -> Result<(), BridgeError> {
        let first = self
            .generator
            .next_valid_id(None)
            .await
            .map_err(|err| BridgeError::probe("could not get first id", err))?;
        let second = self
            .generator
            .next_valid_id(None)
            .await
            .map_err(|err| BridgeError::probe("could not get second id", err))?;

        if first == second {
            return Err(BridgeError::probe(
                "flaki returned the same id twice",
                format!("'{}'", first),
            ));
        }
        if let (Ok(a), Ok(b)) = (first.parse::<u64>(), second.parse::<u64>()) {
            if b < a {
                return Err(BridgeError::probe(
                    "flaki ids are not increasing",
                    format!("'{}' then '{}'", a, b),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HealthCheckModule for FlakiModule {
    #[tracing::instrument(name = "Flaki health checks", skip(self))]
    async fn health_checks(&self) -> Vec<Report> {
        let start = Instant::now();
        let result = self.two_ids().await;
        let duration = start.elapsed();

        let report = match result {
            Ok(()) => Report::ok(NEXT_VALID_ID, duration),
            Err(err) => {
                tracing::warn!("{}", err);
                Report::ko(NEXT_VALID_ID, duration, err)
            }
        };
        vec![report]
    }
}
