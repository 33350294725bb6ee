use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::super_admin::SuperAdminAuth,
    models::tenant::CreateTenantRequest,
    routes::internal_error,
    services::tenants::{TenantError, TenantService},
    AppState,
};

pub async fn list_tenants(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    TenantService::list(&state.db)
        .await
        .map(|tenants| Json(json!(tenants)))
        .map_err(internal_error)
}

pub async fn create_tenant(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    match TenantService::create(&state.db, &body).await {
        Ok(tenant) => Ok((StatusCode::CREATED, Json(json!(tenant)))),
        Err(e) => Err(tenant_error(e)),
    }
}

fn tenant_error(e: TenantError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        TenantError::InvalidSlug | TenantError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TenantError::AlreadyExists(_) => StatusCode::CONFLICT,
        TenantError::NotFound(_) => StatusCode::NOT_FOUND,
        TenantError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    match e {
        TenantError::Other(inner) => internal_error(inner),
        e => (status, Json(json!({ "error": e.to_string() }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_errors_map_to_statuses() {
        assert_eq!(tenant_error(TenantError::InvalidSlug).0, StatusCode::BAD_REQUEST);
        assert_eq!(
            tenant_error(TenantError::InvalidInput("Name is required".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(tenant_error(TenantError::AlreadyExists("acme".into())).0, StatusCode::CONFLICT);

        let (status, body) = tenant_error(TenantError::Other(anyhow::anyhow!("connection reset")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0["error"], "Internal server error");
    }
}
