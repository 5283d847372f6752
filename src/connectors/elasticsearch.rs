use super::errors::ConnectorError;
use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;

const LIST_INDEXES: &str = "_cat/indices";
const CLUSTER_HEALTH: &str = "_cluster/health";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClusterHealth {
    #[serde(default)]
    pub cluster_name: String,
    pub status: String,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub number_of_nodes: u32,
    #[serde(default)]
    pub number_of_data_nodes: u32,
    #[serde(default)]
    pub active_primary_shards: u32,
    #[serde(default)]
    pub active_shards: u32,
    #[serde(default)]
    pub relocating_shards: u32,
    #[serde(default)]
    pub initializing_shards: u32,
    #[serde(default)]
    pub unassigned_shards: u32,
    #[serde(default)]
    pub delayed_unassigned_shards: u32,
    #[serde(default)]
    pub number_of_pending_tasks: u32,
    #[serde(default)]
    pub number_of_in_flight_fetch: u32,
    #[serde(default)]
    pub task_max_waiting_in_queue_millis: u64,
    #[serde(default)]
    pub active_shards_percent_as_number: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IndexSummary {
    pub index: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
}

/// Admin surface of the search engine used by the health module and the
/// index cleaning job.
#[async_trait]
pub trait ElasticsearchConnector: Send + Sync {
    async fn health(&self) -> Result<ClusterHealth, ConnectorError>;
    async fn list_indexes(&self) -> Result<Vec<IndexSummary>, ConnectorError>;
    async fn get_index(&self, name: &str) -> Result<serde_json::Value, ConnectorError>;
    async fn create_index(&self, name: &str) -> Result<(), ConnectorError>;
    async fn delete_index(&self, name: &str) -> Result<(), ConnectorError>;
}

pub struct ElasticsearchClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ElasticsearchClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|err| ConnectorError::Config(format!("could not parse URL: {}", err)))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConnectorError::Config(format!("HTTP client error: {}", err)))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ConnectorError> {
        let span = tracing::debug_span!("elasticsearch request", method = %method, path = path);
        let response = self
            .http_client
            .request(method, self.url(path))
            .query(query)
            .send()
            .instrument(span)
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ConnectorError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(Method::GET, path, query).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ConnectorError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ElasticsearchConnector for ElasticsearchClient {
    async fn health(&self) -> Result<ClusterHealth, ConnectorError> {
        self.get(CLUSTER_HEALTH, &[]).await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexSummary>, ConnectorError> {
        self.get(LIST_INDEXES, &[("format", "json")]).await
    }

    async fn get_index(&self, name: &str) -> Result<serde_json::Value, ConnectorError> {
        self.get(name, &[]).await
    }

    async fn create_index(&self, name: &str) -> Result<(), ConnectorError> {
        self.send(Method::PUT, name, &[]).await.map(|_| ())
    }

    async fn delete_index(&self, name: &str) -> Result<(), ConnectorError> {
        self.send(Method::DELETE, name, &[]).await.map(|_| ())
    }
}
