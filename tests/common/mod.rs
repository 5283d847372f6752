#![allow(dead_code)]

use async_trait::async_trait;
use elasticsearch_bridge::configuration::{get_configuration, DatabaseSettings};
use elasticsearch_bridge::connectors::{ConnectorError, IdGenerator};
use elasticsearch_bridge::health::{HealthCheckModule, HealthComponent, Report};
use elasticsearch_bridge::identity::ComponentIdentity;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ID_TIMEOUT: Duration = Duration::from_millis(500);

pub fn identity() -> ComponentIdentity {
    ComponentIdentity::new("elasticsearch-bridge", "1000", "test", "0123abc")
}

/// Module answering the same reports on every call.
pub struct StaticModule {
    reports: Vec<Report>,
    pub calls: AtomicUsize,
}

impl StaticModule {
    pub fn new(reports: Vec<Report>) -> Self {
        Self {
            reports,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HealthCheckModule for StaticModule {
    async fn health_checks(&self) -> Vec<Report> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reports.clone()
    }
}

pub struct SequenceGenerator(AtomicU64);

impl SequenceGenerator {
    pub fn starting_at(first: u64) -> Self {
        Self(AtomicU64::new(first))
    }
}

#[async_trait]
impl IdGenerator for SequenceGenerator {
    async fn next_valid_id(&self, _trace_parent: Option<&str>) -> Result<String, ConnectorError> {
        Ok(self.0.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

pub struct DownGenerator;

#[async_trait]
impl IdGenerator for DownGenerator {
    async fn next_valid_id(&self, _trace_parent: Option<&str>) -> Result<String, ConnectorError> {
        Err(ConnectorError::Rpc("connection refused".to_string()))
    }
}

pub struct TestApp {
    pub address: String,
    pub component: Arc<HealthComponent>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub async fn spawn_app(component: HealthComponent, generator: Arc<dyn IdGenerator>) -> TestApp {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let component = Arc::new(component);
    let server = elasticsearch_bridge::startup::run(
        listener,
        component.clone(),
        identity(),
        generator,
        ID_TIMEOUT,
    )
    .await
    .expect("Failed to bind address.");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        component,
        client: reqwest::Client::new(),
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let mut connection = PgConnection::connect(&config.connection_string_without_db()).await?;

    connection
        .execute(format!(r#"CREATE DATABASE "{}""#, config.database_name).as_str())
        .await?;

    let connection_pool = PgPool::connect(&config.connection_string()).await?;

    sqlx::migrate!("./migrations").run(&connection_pool).await?;

    Ok(connection_pool)
}

/// Fresh database with migrations applied, or `None` when no Postgres is
/// reachable with the configured credentials.
pub async fn test_database() -> Option<PgPool> {
    let mut configuration = get_configuration().expect("Failed to get configuration");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();

    match configure_database(&configuration.database).await {
        Ok(pool) => Some(pool),
        Err(err) => {
            eprintln!("Skipping tests: failed to connect to postgres: {}", err);
            None
        }
    }
}
