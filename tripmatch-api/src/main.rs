use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripmatch_api::{app, AppState, AuthConfig};
use tripmatch_core::cache::Cache;
use tripmatch_core::events::EventSink;
use tripmatch_core::identity::IdentityResolver;
use tripmatch_core::repository::{CascadeRepository, MatchRepository, TripRepository};
use tripmatch_match::{CacheTtls, TravelServices};
use tripmatch_store::app_config::Config;
use tripmatch_store::{
    DbClient, PgCascadeRepository, PgHostDirectory, PgMatchRepository, PgTripRepository, RedisCache,
};

struct Backends {
    trips: Arc<dyn TripRepository>,
    matches: Arc<dyn MatchRepository>,
    cascades: Arc<dyn CascadeRepository>,
    identity: Arc<dyn IdentityResolver>,
    cache: Arc<dyn Cache>,
}

async fn connect(config: &Config) -> anyhow::Result<Backends> {
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let cache = RedisCache::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    Ok(Backends {
        trips: Arc::new(PgTripRepository::new(db.pool.clone())),
        matches: Arc::new(PgMatchRepository::new(db.pool.clone())),
        cascades: Arc::new(PgCascadeRepository::new(db.pool.clone())),
        identity: Arc::new(PgHostDirectory::new(db.pool.clone())),
        cache: Arc::new(cache),
    })
}

#[cfg(feature = "kafka")]
fn event_sink(config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    let producer = tripmatch_store::EventProducer::new(
        &config.kafka.brokers,
        &config.kafka.analytics_topic,
        &config.kafka.audit_topic,
    )
    .context("Failed to create Kafka producer")?;
    Ok(Arc::new(producer))
}

#[cfg(not(feature = "kafka"))]
fn event_sink(_config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    Ok(Arc::new(tripmatch_store::TracingEventSink))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripmatch_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tripmatch API on port {}", config.server.port);

    let backends = connect(&config).await?;
    let events = event_sink(&config)?;

    let rules = config.travel.clone();
    let travel = TravelServices::new(
        backends.trips,
        backends.matches,
        backends.cascades,
        backends.identity,
        backends.cache,
        events,
        CacheTtls {
            public_seconds: rules.public_cache_ttl_seconds,
            received_seconds: rules.received_cache_ttl_seconds,
        },
    );

    let app_state = AppState {
        travel,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
