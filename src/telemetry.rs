use crate::identity::ComponentIdentity;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{web, Error};
use tracing::subscriber::set_global_default;
use tracing::{Span, Subscriber};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Bunyan-formatted JSON on stdout. `RUST_LOG` overrides `env_filter`.
pub fn get_subscriber(name: String, env_filter: String) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let formatting_layer = BunyanFormattingLayer::new(name, std::io::stdout);
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Installs `subscriber` globally and routes `log` records (sqlx, reqwest,
/// actix) through it. Must be called once, before anything logs.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    LogTracer::init().expect("Failed to set logger.");
    set_global_default(subscriber).expect("Failed to set subscriber.");
}

/// Root span of every HTTP request, carrying the component identity.
/// `correlation_id` starts empty and is filled in by the
/// [`Correlation`](crate::middleware::Correlation) middleware.
pub struct BridgeRootSpanBuilder;

impl RootSpanBuilder for BridgeRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let (component_name, component_id) = request
            .app_data::<web::Data<ComponentIdentity>>()
            .map(|identity| (identity.name.clone(), identity.id.clone()))
            .unwrap_or_default();
        tracing_actix_web::root_span!(
            request,
            correlation_id = tracing::field::Empty,
            component_name = %component_name,
            component_id = %component_id,
        )
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mock::MockIdGenerator;
    use crate::middleware::Correlation;
    use actix_web::{test, App, HttpResponse};
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing_actix_web::TracingLogger;
    use tracing_subscriber::layer::Context;
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    /// Fields recorded on `HTTP request` spans.
    #[derive(Clone, Default)]
    struct RequestSpanFields(Arc<Mutex<HashMap<String, String>>>);

    impl RequestSpanFields {
        fn get(&self, name: &str) -> Option<String> {
            self.0.lock().unwrap().get(name).cloned()
        }
    }

    struct Collect<'a>(&'a mut HashMap<String, String>);

    impl Visit for Collect<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{:?}", value));
        }
    }

    impl<S> Layer<S> for RequestSpanFields
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            if attrs.metadata().name() == "HTTP request" {
                attrs.record(&mut Collect(&mut self.0.lock().unwrap()));
            }
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            let is_request = ctx
                .span(id)
                .map(|span| span.name() == "HTTP request")
                .unwrap_or(false);
            if is_request {
                values.record(&mut Collect(&mut self.0.lock().unwrap()));
            }
        }
    }

    #[actix_web::test]
    async fn request_span_carries_correlation_id_and_identity() {
        let fields = RequestSpanFields::default();
        let subscriber = Registry::default().with(fields.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let identity = ComponentIdentity::new("elasticsearch-bridge", "42", "test", "abc");
        let app = test::init_service(
            App::new()
                .wrap(Correlation::new(
                    Arc::new(MockIdGenerator::starting_at(7)),
                    Duration::from_secs(1),
                ))
                .wrap(TracingLogger::<BridgeRootSpanBuilder>::new())
                .app_data(web::Data::new(identity))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Correlation-ID", "abc-123"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert!(res.status().is_success());
        assert_eq!(fields.get("correlation_id").as_deref(), Some("abc-123"));
        assert_eq!(fields.get("component_name").as_deref(), Some("elasticsearch-bridge"));
        assert_eq!(fields.get("component_id").as_deref(), Some("42"));
    }

    #[actix_web::test]
    async fn generated_id_is_recorded_on_the_request_span() {
        let fields = RequestSpanFields::default();
        let _guard = tracing::subscriber::set_default(Registry::default().with(fields.clone()));

        let app = test::init_service(
            App::new()
                .wrap(Correlation::new(
                    Arc::new(MockIdGenerator::starting_at(7)),
                    Duration::from_secs(1),
                ))
                .wrap(TracingLogger::<BridgeRootSpanBuilder>::new())
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert_eq!(fields.get("correlation_id").as_deref(), Some("7"));
        assert_eq!(fields.get("component_name").as_deref(), Some(""));
    }
}
