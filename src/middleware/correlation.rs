use crate::connectors::{ConnectorError, IdGenerator};
use crate::errors::BridgeError;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures::{
    future::{FutureExt, LocalBoxFuture},
    task::{Context, Poll},
};
use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use tracing_actix_web::RootSpan;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const TRACE_PARENT_HEADER: &str = "traceparent";
const DEGRADED_PREFIX: &str = "degraded-";

/// Correlation identifier attached to every request, readable by handlers
/// through `web::ReqData<CorrelationId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn is_degraded(&self) -> bool {
        self.0.starts_with(DEGRADED_PREFIX)
    }
}

/// Locally generated identifier used when the ID generator is unavailable.
pub fn degraded_id() -> String {
    format!("{}{}", DEGRADED_PREFIX, rand::random::<u64>())
}

/// Asks the generator for a fresh identifier, falling back to [`degraded_id`]
/// on any failure. Never waits longer than `timeout`.
pub async fn next_id_or_degraded(
    generator: &dyn IdGenerator,
    trace_parent: Option<&str>,
    timeout: Duration,
) -> String {
    let span = tracing::info_span!("Request correlation id");
    let result = match tokio::time::timeout(timeout, generator.next_valid_id(trace_parent))
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(elapsed) => Err(ConnectorError::from(elapsed)),
    };
    match result {
        Ok(id) => id,
        Err(err) => {
            let id = degraded_id();
            let err = BridgeError::identity("could not get id from flaki", err);
            tracing::warn!(degraded_id = %id, "{}", err);
            id
        }
    }
}

/// Keeps a non-empty existing identifier, otherwise obtains a new one.
pub async fn resolve_correlation_id(
    existing: Option<&str>,
    trace_parent: Option<&str>,
    generator: &dyn IdGenerator,
    timeout: Duration,
) -> String {
    match existing.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => next_id_or_degraded(generator, trace_parent, timeout).await,
    }
}

/// Middleware guaranteeing a correlation ID on every request. The chosen ID is
/// recorded on the request's root span when one is present, and echoed back in
/// the `X-Correlation-ID` response header.
pub struct Correlation {
    generator: Arc<dyn IdGenerator>,
    timeout: Duration,
}

impl Correlation {
    pub fn new(generator: Arc<dyn IdGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Correlation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CorrelationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationMiddleware {
            service: Rc::new(RefCell::new(service)),
            generator: self.generator.clone(),
            timeout: self.timeout,
        }))
    }
}

pub struct CorrelationMiddleware<S> {
    service: Rc<RefCell<S>>,
    generator: Arc<dyn IdGenerator>,
    timeout: Duration,
}

fn header(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for CorrelationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = S::Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if let Ok(mut service) = self.service.try_borrow_mut() {
            service.poll_ready(ctx)
        } else {
            Poll::Pending
        }
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let generator = self.generator.clone();
        let timeout = self.timeout;

        async move {
            let existing = header(&req, CORRELATION_ID_HEADER);
            let trace_parent = header(&req, TRACE_PARENT_HEADER);
            let id = resolve_correlation_id(
                existing.as_deref(),
                trace_parent.as_deref(),
                generator.as_ref(),
                timeout,
            )
            .await;
            if let Some(root_span) = req.extensions().get::<RootSpan>() {
                root_span.record("correlation_id", id.as_str());
            }
            tracing::debug!(correlation_id = %id, "request correlated");
            req.extensions_mut().insert(CorrelationId(id.clone()));

            let fut = service.borrow_mut().call(req);
            let mut res = fut.await?;
            if let Ok(value) = HeaderValue::from_str(&id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
            }
            Ok(res)
        }
        .boxed_local()
    }
}
