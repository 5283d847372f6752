//! Client for the Flaki distributed unique ID generator.
//!
//! Flaki serves a single unary RPC, `fb.Flaki/NextValidID`, answering with a
//! globally unique, monotonically increasing identifier. The client is written
//! against `tonic::client::Grpc` directly with prost messages, so no code
//! generation step is needed at build time.

use super::errors::ConnectorError;
use async_trait::async_trait;
use std::time::Duration;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};

const NEXT_VALID_ID: &str = "/fb.Flaki/NextValidID";

#[derive(Clone, PartialEq, prost::Message)]
pub struct FlakiRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FlakiReply {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// Requests a fresh identifier. `trace_parent` is a W3C `traceparent`
    /// value forwarded as request metadata when the caller has one.
    async fn next_valid_id(&self, trace_parent: Option<&str>) -> Result<String, ConnectorError>;
}

pub struct FlakiClient {
    grpc: tonic::client::Grpc<Channel>,
    timeout: Duration,
}

impl FlakiClient {
    /// Builds a lazily connecting client: nothing is dialed until the first
    /// request, so an unreachable Flaki never blocks startup.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|err| ConnectorError::Config(format!("invalid flaki url '{}': {}", url, err)))?
            .connect_timeout(timeout)
            .timeout(timeout);

        Ok(Self {
            grpc: tonic::client::Grpc::new(endpoint.connect_lazy()),
            timeout,
        })
    }
}

#[async_trait]
impl IdGenerator for FlakiClient {
    #[tracing::instrument(name = "Flaki NextValidID", skip(self, trace_parent))]
    async fn next_valid_id(&self, trace_parent: Option<&str>) -> Result<String, ConnectorError> {
        let mut grpc = self.grpc.clone();
        let mut request = tonic::Request::new(FlakiRequest {});
        request.set_timeout(self.timeout);
        if let Some(trace_parent) = trace_parent {
            match trace_parent.parse::<MetadataValue<Ascii>>() {
                Ok(value) => {
                    request.metadata_mut().insert("traceparent", value);
                }
                Err(_) => tracing::debug!("dropping unparseable traceparent '{}'", trace_parent),
            }
        }

        let call = async move {
            grpc.ready()
                .await
                .map_err(|err| ConnectorError::Rpc(format!("flaki not ready: {}", err)))?;
            let codec = ProstCodec::<FlakiRequest, FlakiReply>::default();
            let response = grpc
                .unary(request, PathAndQuery::from_static(NEXT_VALID_ID), codec)
                .await?;
            Ok::<_, ConnectorError>(response.into_inner())
        };
        let reply = tokio::time::timeout(self.timeout, call).await??;

        if reply.id.is_empty() {
            return Err(ConnectorError::Decode("flaki returned an empty id".to_string()));
        }
        Ok(reply.id)
    }
}
