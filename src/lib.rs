// Library exports for the API binary, tools and tests
pub mod app;
pub mod client;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use config::Config;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: RedisClient,
    pub config: Arc<Config>,
}
