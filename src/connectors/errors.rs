/// Errors that can occur while talking to a monitored dependency
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Transport level failure (connection refused, reset, DNS)
    #[error("could not get response: {0}")]
    Http(String),
    /// The call did not complete within its bound
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The dependency answered with an error status
    #[error("invalid status code '{status}': {body}")]
    Status { status: u16, body: String },
    /// The response body does not have the expected shape
    #[error("could not decode response: {0}")]
    Decode(String),
    /// gRPC call rejected or failed
    #[error("rpc failed: {0}")]
    Rpc(String),
    #[error("redis error: {0}")]
    Redis(String),
    /// Connector built from an unusable configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<redis::RedisError> for ConnectorError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Redis(err.to_string())
        }
    }
}

impl From<tonic::Status> for ConnectorError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::DeadlineExceeded => Self::Timeout(status.message().to_string()),
            code => Self::Rpc(format!("{:?}: {}", code, status.message())),
        }
    }
}

impl From<tonic::transport::Error> for ConnectorError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ConnectorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(err.to_string())
    }
}
