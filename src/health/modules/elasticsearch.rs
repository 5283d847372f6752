use crate::connectors::ElasticsearchConnector;
use crate::errors::BridgeError;
use crate::health::models::{Report, Status};
use crate::health::HealthCheckModule;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

const HEALTH: &str = "Health";
const INDEX_API: &str = "Index API";
const PROBE_INDEX_PREFIX: &str = "health-check-";

/// Health checks of the search engine: the cluster state and a full index
/// lifecycle (list, create, delete).
pub struct ElasticsearchModule {
    client: Arc<dyn ElasticsearchConnector>,
}

impl ElasticsearchModule {
    pub fn new(client: Arc<dyn ElasticsearchConnector>) -> Self {
        Self { client }
    }

    async fn cluster_health(&self) -> Report {
        let start = Instant::now();
        let result = self.client.health().await;
        let duration = start.elapsed();

        match result {
            Ok(health) => {
                let status = match health.status.as_str() {
                    "green" => Status::Ok,
                    "yellow" => Status::Degraded,
                    "red" => Status::Ko,
                    _ => Status::Unknown,
                };
                let infos = serde_json::to_value(&health).unwrap_or_default();
                Report::new(HEALTH, duration, status).with_infos(infos)
            }
            Err(err) => Report::ko(
                HEALTH,
                duration,
                BridgeError::probe("could not get elasticsearch health", err),
            ),
        }
    }

    async fn index_api(&self) -> Report {
        let start = Instant::now();
        let result = self.index_round_trip().await;
        let duration = start.elapsed();

        match result {
            Ok(()) => Report::ok(INDEX_API, duration),
            Err(err) => {
                tracing::warn!("{}", err);
                Report::ko(INDEX_API, duration, err)
            }
        }
    }

    async fn index_round_trip(&self) -> Result<(), BridgeError> {
        self.client
            .list_indexes()
            .await
            .map_err(|err| BridgeError::probe("could not list indexes", err))?;

        let name = format!("{}{}", PROBE_INDEX_PREFIX, uuid::Uuid::new_v4());
        self.client
            .create_index(&name)
            .await
            .map_err(|err| BridgeError::probe(format!("could not create index '{}'", name), err))?;
        self.client
            .delete_index(&name)
            .await
            .map_err(|err| BridgeError::probe(format!("could not delete index '{}'", name), err))?;
        Ok(())
    }
}

#[async_trait]
impl HealthCheckModule for ElasticsearchModule {
    #[tracing::instrument(name = "Elasticsearch health checks", skip(self))]
    async fn health_checks(&self) -> Vec<Report> {
        let health = self.cluster_health().await;
        let index_api = self.index_api().await;
        vec![health, index_api]
    }
}
