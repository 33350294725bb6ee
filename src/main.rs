use std::sync::Arc;

use redis::Client as RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noticeboard_api::{app, config::Config, db, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_tenants(&pool).await?;
    info!("Database connected and migrations applied");

    // Connections are opened per use; a bad URL fails here, an unreachable server later.
    let redis = RedisClient::open(config.redis_url.as_str())?;

    services::metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        redis,
        config: config.clone(),
    };

    let router = app::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("noticeboard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
