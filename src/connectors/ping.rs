use super::errors::ConnectorError;
use async_trait::async_trait;
use std::time::Duration;

/// Anything that can answer a liveness ping.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> Result<(), ConnectorError>;
}

/// Pings an HTTP endpoint and expects a success status.
///
/// Used for the InfluxDB `/ping` route (answers `204 No Content`) and for the
/// Jaeger collector health check URL.
pub struct HttpPinger {
    url: String,
    http_client: reqwest::Client,
}

impl HttpPinger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        reqwest::Url::parse(url)
            .map_err(|err| ConnectorError::Config(format!("could not parse URL '{}': {}", url, err)))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConnectorError::Config(format!("HTTP client error: {}", err)))?;

        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }

    /// InfluxDB exposes its liveness route under `/ping`.
    pub fn influx(base_url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        Self::new(&format!("{}/ping", base_url.trim_end_matches('/')), timeout)
    }
}

#[async_trait]
impl Pinger for HttpPinger {
    #[tracing::instrument(name = "HTTP ping", skip(self), fields(url = %self.url))]
    async fn ping(&self) -> Result<(), ConnectorError> {
        let response = self.http_client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
