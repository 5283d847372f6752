use super::errors::ConnectorError;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const SENTRY_VERSION: u8 = 7;

/// Error-tracking service able to accept an event.
#[async_trait]
pub trait ErrorTracker: Send + Sync {
    /// Submits a synthetic event and returns the id the service assigned to it.
    async fn capture_message(&self, message: &str) -> Result<String, ConnectorError>;
}

/// Posts events to the store endpoint derived from a Sentry DSN
/// (`https://<public_key>[:<secret>]@<host>[/<path>]/<project_id>`).
pub struct SentryClient {
    store_url: String,
    auth_header: String,
    http_client: reqwest::Client,
}

impl SentryClient {
    pub fn new(dsn: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let (store_url, public_key) = parse_dsn(dsn)?;
        let auth_header = format!(
            "Sentry sentry_version={}, sentry_key={}, sentry_client={}/{}",
            SENTRY_VERSION,
            public_key,
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        );
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConnectorError::Config(format!("HTTP client error: {}", err)))?;

        Ok(Self {
            store_url,
            auth_header,
            http_client,
        })
    }
}

fn parse_dsn(dsn: &str) -> Result<(String, String), ConnectorError> {
    let url = reqwest::Url::parse(dsn)
        .map_err(|err| ConnectorError::Config(format!("invalid sentry dsn: {}", err)))?;
    let public_key = url.username();
    if public_key.is_empty() {
        return Err(ConnectorError::Config("sentry dsn has no public key".to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ConnectorError::Config("sentry dsn has no host".to_string()))?;

    let path = url.path().trim_matches('/');
    let (prefix, project_id) = match path.rsplit_once('/') {
        Some((prefix, project_id)) => (format!("/{}", prefix), project_id),
        None => (String::new(), path),
    };
    if project_id.is_empty() {
        return Err(ConnectorError::Config("sentry dsn has no project id".to_string()));
    }

    let port = url.port().map(|port| format!(":{}", port)).unwrap_or_default();
    let store_url = format!(
        "{}://{}{}{}/api/{}/store/",
        url.scheme(),
        host,
        port,
        prefix,
        project_id
    );
    Ok((store_url, public_key.to_string()))
}

#[async_trait]
impl ErrorTracker for SentryClient {
    #[tracing::instrument(name = "Sentry capture", skip(self, message))]
    async fn capture_message(&self, message: &str) -> Result<String, ConnectorError> {
        let event_id = uuid::Uuid::new_v4().simple().to_string();
        let event = json!({
            "event_id": event_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": "info",
            "logger": env!("CARGO_PKG_NAME"),
            "platform": "other",
            "message": message,
        });

        let response = self
            .http_client
            .post(&self.store_url)
            .header("X-Sentry-Auth", &self.auth_header)
            .json(&event)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(event_id)
    }
}
