use super::errors::ConnectorError;
use super::ping::Pinger;
use async_trait::async_trait;
use std::time::Duration;

/// Sends `PING` over a fresh multiplexed connection.
pub struct RedisPinger {
    client: redis::Client,
    timeout: Duration,
}

impl RedisPinger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let client = redis::Client::open(url)
            .map_err(|err| ConnectorError::Config(format!("invalid redis url: {}", err)))?;
        Ok(Self { client, timeout })
    }

    async fn ping_once(&self) -> Result<(), ConnectorError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(ConnectorError::Redis(format!("unexpected PING reply '{}'", pong)));
        }
        Ok(())
    }
}

#[async_trait]
impl Pinger for RedisPinger {
    #[tracing::instrument(name = "Redis ping", skip(self))]
    async fn ping(&self) -> Result<(), ConnectorError> {
        tokio::time::timeout(self.timeout, self.ping_once()).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_redis_url() {
        assert!(RedisPinger::new("http://localhost:6379", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_fails_within_timeout() {
        // Port 1 is never a redis server.
        let pinger = RedisPinger::new("redis://127.0.0.1:1/", Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();

        assert!(pinger.ping().await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
