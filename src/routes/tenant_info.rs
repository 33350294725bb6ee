use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    middleware::tenant::TenantSlug, routes::internal_error, services::tenants::TenantService,
    AppState,
};

pub async fn get_tenant_info(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    info_response(&tenant, TenantService::name(&state.db, &tenant).await)
}

/// A failed lookup is a server error, not a missing tenant.
fn info_response(
    tenant: &str,
    name: anyhow::Result<Option<String>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match name {
        Ok(Some(name)) => Ok(Json(json!({ "slug": tenant, "name": name }))),
        Ok(None) => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Tenant not found" })))),
        Err(e) => Err(internal_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_tenant_returns_slug_and_name() {
        let Json(body) = info_response("acme", Ok(Some("Acme Corp".into()))).unwrap();
        assert_eq!(body["slug"], "acme");
        assert_eq!(body["name"], "Acme Corp");
    }

    #[test]
    fn missing_tenant_is_not_found() {
        let (status, _) = info_response("acme", Ok(None)).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_failure_is_a_server_error() {
        let (status, body) =
            info_response("acme", Err(anyhow::anyhow!("pool timed out"))).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0["error"], "Internal server error");
    }
}
