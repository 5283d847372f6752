use crate::configuration::Settings;
use crate::connectors::{
    ConnectorError, ElasticsearchConnector, ErrorTracker, HttpPinger, IdGenerator, RedisPinger,
    SentryClient,
};
use crate::health::duration::format_duration;
use crate::health::modules::{ElasticsearchModule, FlakiModule, PingModule, SentryModule};
use crate::health::{
    HealthComponent, MemoryReportStore, PgReportStore, ReportStore, ELASTICSEARCH, FLAKI, INFLUX,
    JAEGER, REDIS, SENTRY,
};
use crate::identity::ComponentIdentity;
use crate::jobs::{
    clean_store, index_cleaning, JobRunRecorder, Locker, LogJobRunRecorder, NoopLocker,
    PgJobRunRecorder, PgLocker, Scheduler, CLEAN_JOB, INDEX_CLEANING_JOB,
};
use crate::middleware::Correlation;
use crate::routes;
use crate::telemetry::BridgeRootSpanBuilder;
use actix_web::{dev::Server, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

pub async fn run(
    listener: TcpListener,
    component: Arc<HealthComponent>,
    identity: ComponentIdentity,
    generator: Arc<dyn IdGenerator>,
    id_timeout: Duration,
) -> Result<Server, std::io::Error> {
    let component = web::Data::from(component);
    let identity = web::Data::new(identity);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Correlation::new(generator.clone(), id_timeout))
            .wrap(TracingLogger::<BridgeRootSpanBuilder>::new())
            .app_data(component.clone())
            .app_data(identity.clone())
            .service(routes::version)
            .service(routes::all_statuses)
            .service(routes::read)
            .service(routes::exec)
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Where reports, job locks and job runs go.
pub struct Persistence {
    pub store: Arc<dyn ReportStore>,
    pub locker: Arc<dyn Locker>,
    pub recorder: Arc<dyn JobRunRecorder>,
}

impl Persistence {
    /// Single-instance setup: nothing survives a restart and every instance
    /// considers itself the lock holder.
    pub fn memory(identity: &ComponentIdentity) -> Self {
        Self {
            store: Arc::new(MemoryReportStore::new(identity)),
            locker: Arc::new(NoopLocker),
            recorder: Arc::new(LogJobRunRecorder),
        }
    }

    pub fn postgres(pool: PgPool, identity: &ComponentIdentity) -> Self {
        let holder = format!("{}:{}", identity.name, identity.id);
        Self {
            store: Arc::new(PgReportStore::new(pool.clone(), identity)),
            locker: Arc::new(PgLocker::new(pool.clone(), holder)),
            recorder: Arc::new(PgJobRunRecorder::new(pool)),
        }
    }
}

/// Wires one module per unit. Dependencies with no configured address get a
/// module that reports `Deactivated`.
pub fn health_component(
    settings: &Settings,
    store: Arc<dyn ReportStore>,
    generator: Arc<dyn IdGenerator>,
    elasticsearch: Arc<dyn ElasticsearchConnector>,
) -> Result<HealthComponent, ConnectorError> {
    let influx = if settings.influx.enabled() {
        let pinger = HttpPinger::influx(&settings.influx.url, settings.influx.timeout)?;
        PingModule::new(INFLUX, "ping", Arc::new(pinger), settings.influx.timeout)
    } else {
        PingModule::disabled(INFLUX, "ping")
    };

    let jaeger = if settings.jaeger.enabled() {
        let pinger = HttpPinger::new(
            &settings.jaeger.collector_healthcheck_url,
            settings.jaeger.timeout,
        )?;
        PingModule::new(JAEGER, "collector", Arc::new(pinger), settings.jaeger.timeout)
    } else {
        PingModule::disabled(JAEGER, "collector")
    };

    let redis = if settings.redis.enabled() {
        let pinger = RedisPinger::new(&settings.redis.url, settings.redis.timeout)?;
        PingModule::new(REDIS, "ping", Arc::new(pinger), settings.redis.timeout)
    } else {
        PingModule::disabled(REDIS, "ping")
    };

    let sentry = if settings.sentry.enabled() {
        let tracker: Arc<dyn ErrorTracker> =
            Arc::new(SentryClient::new(&settings.sentry.dsn, settings.sentry.timeout)?);
        SentryModule::new(tracker, settings.sentry.timeout)
    } else {
        SentryModule::disabled()
    };

    let validity = &settings.jobs.validity;
    Ok(HealthComponent::new(store)
        .with_unit(INFLUX, Arc::new(influx), validity.influx)
        .with_unit(JAEGER, Arc::new(jaeger), validity.jaeger)
        .with_unit(REDIS, Arc::new(redis), validity.redis)
        .with_unit(SENTRY, Arc::new(sentry), validity.sentry)
        .with_unit(FLAKI, Arc::new(FlakiModule::new(generator)), validity.flaki)
        .with_unit(
            ELASTICSEARCH,
            Arc::new(ElasticsearchModule::new(elasticsearch)),
            validity.elasticsearch,
        ))
}

/// Per-instance jobs: every unit's health checks and the stored report
/// cleanup.
pub fn local_scheduler(
    settings: &Settings,
    identity: &ComponentIdentity,
    component: &HealthComponent,
    persistence: &Persistence,
) -> anyhow::Result<Scheduler> {
    let mut scheduler = Scheduler::local(identity.clone(), persistence.recorder.clone());
    let units: Vec<String> = component.units().map(str::to_string).collect();
    for unit in units {
        scheduler.register(component.job(&unit)?)?;
        scheduler.schedule(&settings.jobs.health_schedule, &unit)?;
    }
    scheduler.register(clean_store(persistence.store.clone()))?;
    scheduler.schedule(&every(settings.jobs.clean_interval), CLEAN_JOB)?;
    Ok(scheduler)
}

/// Jobs that must run on a single instance at a time.
pub fn distributed_scheduler(
    settings: &Settings,
    identity: &ComponentIdentity,
    persistence: &Persistence,
    elasticsearch: Arc<dyn ElasticsearchConnector>,
) -> anyhow::Result<Scheduler> {
    let mut scheduler = Scheduler::distributed(
        identity.clone(),
        persistence.recorder.clone(),
        persistence.locker.clone(),
        settings.jobs.lock_lease,
    );
    scheduler.register(index_cleaning(
        elasticsearch,
        settings.elasticsearch.index_expiration,
    ))?;
    scheduler.schedule(
        &every(settings.elasticsearch.index_clean_interval),
        INDEX_CLEANING_JOB,
    )?;
    Ok(scheduler)
}

fn every(interval: Duration) -> String {
    format!("@every {}", format_duration(interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mock::{MockElasticsearch, MockIdGenerator};
    use crate::health::{Status, UNITS};

    fn identity() -> ComponentIdentity {
        ComponentIdentity::new("elasticsearch-bridge", "1", "test", "abc")
    }

    #[test]
    fn every_uses_go_durations() {
        assert_eq!(every(Duration::from_secs(90)), "@every 1m30s");
    }

    #[tokio::test]
    async fn unconfigured_dependencies_are_deactivated() {
        let settings = Settings::default();
        let persistence = Persistence::memory(&identity());
        let component = health_component(
            &settings,
            persistence.store.clone(),
            Arc::new(MockIdGenerator::starting_at(1)),
            Arc::new(MockElasticsearch::default()),
        )
        .unwrap();

        let mut units: Vec<&str> = component.units().collect();
        units.sort();
        let mut expected = UNITS.to_vec();
        expected.sort();
        assert_eq!(units, expected);

        for unit in [INFLUX, JAEGER, REDIS, SENTRY] {
            let reports = component.exec(unit).await.unwrap();
            assert_eq!(reports.len(), 1, "{}", unit);
            assert_eq!(reports[0].status, Status::Deactivated, "{}", unit);
        }
    }

    #[tokio::test]
    async fn schedulers_bind_every_job() {
        let settings = Settings::default();
        let id = identity();
        let persistence = Persistence::memory(&id);
        let elasticsearch: Arc<dyn ElasticsearchConnector> =
            Arc::new(MockElasticsearch::default());
        let component = health_component(
            &settings,
            persistence.store.clone(),
            Arc::new(MockIdGenerator::starting_at(1)),
            elasticsearch.clone(),
        )
        .unwrap();

        let local = local_scheduler(&settings, &id, &component, &persistence).unwrap();
        let distributed =
            distributed_scheduler(&settings, &id, &persistence, elasticsearch).unwrap();

        let cancel = tokio_util::sync::CancellationToken::new();
        let local = local.start(cancel.clone());
        let distributed = distributed.start(cancel.clone());
        assert_eq!(local.len(), UNITS.len() + 1);
        assert_eq!(distributed.len(), 1);
        local.shutdown().await;
        distributed.shutdown().await;
    }

    #[test]
    fn invalid_health_schedule_is_rejected() {
        let mut settings = Settings::default();
        settings.jobs.health_schedule = "@fortnightly".to_string();
        let id = identity();
        let persistence = Persistence::memory(&id);
        let component = HealthComponent::new(persistence.store.clone()).with_unit(
            INFLUX,
            Arc::new(PingModule::disabled(INFLUX, "ping")),
            Duration::from_secs(60),
        );

        assert!(local_scheduler(&settings, &id, &component, &persistence).is_err());
    }
}
