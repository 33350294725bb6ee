pub mod announcements;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod tenant_info;
pub mod tenants;
pub mod users;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Log a service failure and turn it into a 500 response.
pub(crate) fn internal_error(e: anyhow::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("request failed: {e:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
}
