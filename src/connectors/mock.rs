//! In-process stand-ins for the connectors, used by unit tests.
//!
//! Every mock sleeps for a millisecond before answering so probe durations are
//! never zero.

use super::elasticsearch::{ClusterHealth, ElasticsearchConnector, IndexSummary};
use super::errors::ConnectorError;
use super::flaki::IdGenerator;
use super::ping::Pinger;
use super::sentry::ErrorTracker;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

async fn latency() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Pinger answering with a fixed outcome and counting calls.
pub struct MockPinger {
    failure: Option<String>,
    pub calls: AtomicUsize,
}

impl MockPinger {
    pub fn healthy() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Pinger for MockPinger {
    async fn ping(&self) -> Result<(), ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        latency().await;
        match &self.failure {
            Some(message) => Err(ConnectorError::Http(message.clone())),
            None => Ok(()),
        }
    }
}

/// Search engine whose indexes live in memory.
#[derive(Default)]
pub struct MockElasticsearch {
    pub cluster_status: String,
    pub indexes: Mutex<Vec<String>>,
    pub fail_health: bool,
    pub fail_list: bool,
    pub fail_create: bool,
    /// Index names whose deletion fails.
    pub undeletable: Vec<String>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockElasticsearch {
    pub fn with_status(status: &str) -> Self {
        Self {
            cluster_status: status.to_string(),
            ..Default::default()
        }
    }

    pub fn with_indexes(names: &[&str]) -> Self {
        Self {
            cluster_status: "green".to_string(),
            indexes: Mutex::new(names.iter().map(|name| name.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ElasticsearchConnector for MockElasticsearch {
    async fn health(&self) -> Result<ClusterHealth, ConnectorError> {
        latency().await;
        if self.fail_health {
            return Err(ConnectorError::Http("connection refused".to_string()));
        }
        Ok(ClusterHealth {
            cluster_name: "docker-cluster".to_string(),
            status: self.cluster_status.clone(),
            number_of_nodes: 1,
            ..Default::default()
        })
    }

    async fn list_indexes(&self) -> Result<Vec<IndexSummary>, ConnectorError> {
        latency().await;
        if self.fail_list {
            return Err(ConnectorError::Http("connection reset by peer".to_string()));
        }
        Ok(self
            .index_names()
            .into_iter()
            .map(|index| IndexSummary {
                index,
                status: Some("open".to_string()),
                health: Some(self.cluster_status.clone()),
            })
            .collect())
    }

    async fn get_index(&self, name: &str) -> Result<serde_json::Value, ConnectorError> {
        latency().await;
        if self.index_names().iter().any(|index| index == name) {
            Ok(serde_json::json!({ name: { "settings": {} } }))
        } else {
            Err(ConnectorError::Status {
                status: 404,
                body: "index_not_found_exception".to_string(),
            })
        }
    }

    async fn create_index(&self, name: &str) -> Result<(), ConnectorError> {
        latency().await;
        if self.fail_create {
            return Err(ConnectorError::Status {
                status: 403,
                body: "cluster_block_exception".to_string(),
            });
        }
        self.indexes.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), ConnectorError> {
        latency().await;
        if self.undeletable.iter().any(|index| index == name) {
            return Err(ConnectorError::Status {
                status: 500,
                body: format!("could not delete {}", name),
            });
        }
        let mut indexes = self.indexes.lock().unwrap();
        let before = indexes.len();
        indexes.retain(|index| index != name);
        if indexes.len() == before {
            return Err(ConnectorError::Status {
                status: 404,
                body: "index_not_found_exception".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// ID generator handing out increasing numbers, or failing every call.
pub struct MockIdGenerator {
    next: AtomicU64,
    failing: bool,
    /// `traceparent` values seen so far.
    pub trace_parents: Mutex<Vec<Option<String>>>,
}

impl MockIdGenerator {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
            failing: false,
            trace_parents: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::starting_at(0)
        }
    }
}

#[async_trait]
impl IdGenerator for MockIdGenerator {
    async fn next_valid_id(&self, trace_parent: Option<&str>) -> Result<String, ConnectorError> {
        self.trace_parents
            .lock()
            .unwrap()
            .push(trace_parent.map(str::to_string));
        latency().await;
        if self.failing {
            return Err(ConnectorError::Timeout("deadline has elapsed".to_string()));
        }
        Ok(self.next.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

/// ID generator returning the same value twice in a row.
pub struct StuckIdGenerator;

#[async_trait]
impl IdGenerator for StuckIdGenerator {
    async fn next_valid_id(&self, _trace_parent: Option<&str>) -> Result<String, ConnectorError> {
        latency().await;
        Ok("42".to_string())
    }
}

pub struct MockErrorTracker {
    pub reject: bool,
    pub captured: Mutex<Vec<String>>,
}

impl MockErrorTracker {
    pub fn accepting() -> Self {
        Self {
            reject: false,
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            captured: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ErrorTracker for MockErrorTracker {
    async fn capture_message(&self, message: &str) -> Result<String, ConnectorError> {
        latency().await;
        if self.reject {
            return Err(ConnectorError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            });
        }
        self.captured.lock().unwrap().push(message.to_string());
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }
}
