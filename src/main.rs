use clap::Parser;
use elasticsearch_bridge::configuration::{get_configuration_from, DatabaseSettings};
use elasticsearch_bridge::connectors::{
    ElasticsearchClient, ElasticsearchConnector, FlakiClient, IdGenerator,
};
use elasticsearch_bridge::identity::ComponentIdentity;
use elasticsearch_bridge::middleware::correlation::next_id_or_degraded;
use elasticsearch_bridge::startup::{
    distributed_scheduler, health_component, local_scheduler, run, Persistence,
};
use elasticsearch_bridge::telemetry::{get_subscriber, init_subscriber};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(version, about = "Health checks of the platform dependencies")]
struct Cli {
    /// Configuration file, extension optional.
    #[arg(long, env = "BRIDGE_CONFIG_FILE", default_value = "configuration")]
    config_file: String,
}

async fn connect_database(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    tracing::info!(
        db_host = %settings.host,
        db_port = settings.port,
        db_name = %settings.database_name,
        "Connecting to PostgreSQL"
    );

    let connect_options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.username)
        .password(&settings.password)
        .database(&settings.database_name)
        .ssl_mode(PgSslMode::Disable);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber(env!("CARGO_PKG_NAME").into(), "info".into());
    init_subscriber(subscriber);

    let cli = Cli::parse();
    let settings = get_configuration_from(&cli.config_file)?;

    let flaki: Arc<dyn IdGenerator> =
        Arc::new(FlakiClient::new(&settings.flaki.url, settings.flaki.timeout)?);
    let component_id = next_id_or_degraded(flaki.as_ref(), None, settings.flaki.timeout).await;
    let identity = ComponentIdentity::new(
        &settings.component.name,
        component_id,
        &settings.component.environment,
        &settings.component.git_commit,
    );
    tracing::info!(
        component_name = %identity.name,
        component_id = %identity.id,
        version = %identity.version,
        environment = %identity.environment,
        git_commit = %identity.git_commit,
        "Starting component"
    );

    let persistence = if settings.database.enabled {
        let pool = connect_database(&settings.database).await?;
        Persistence::postgres(pool, &identity)
    } else {
        tracing::warn!("database disabled, reports are kept in memory");
        Persistence::memory(&identity)
    };

    let elasticsearch: Arc<dyn ElasticsearchConnector> = Arc::new(ElasticsearchClient::new(
        &settings.elasticsearch.url,
        settings.elasticsearch.timeout,
    )?);
    let component = health_component(
        &settings,
        persistence.store.clone(),
        flaki.clone(),
        elasticsearch.clone(),
    )?;

    let local = local_scheduler(&settings, &identity, &component, &persistence)?;
    let distributed = distributed_scheduler(&settings, &identity, &persistence, elasticsearch)?;
    let cancel = CancellationToken::new();
    let local = local.start(cancel.child_token());
    let distributed = distributed.start(cancel.child_token());

    let address = format!("{}:{}", settings.app_host, settings.app_port);
    tracing::info!("Start server at {:?}", &address);
    let listener = TcpListener::bind(&address)?;
    let server = run(
        listener,
        Arc::new(component),
        identity,
        flaki,
        settings.flaki.timeout,
    )
    .await?;

    // actix stops the server on SIGINT and SIGTERM; background jobs follow.
    server.await?;
    cancel.cancel();
    local.shutdown().await;
    distributed.shutdown().await;
    tracing::info!("Stopped");
    Ok(())
}
