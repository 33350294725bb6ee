use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::{roles::require_role, tenant::TenantSlug},
    models::{
        auth::AuthenticatedUser,
        user::{CreateUserRequest, UserRole},
    },
    routes::internal_error,
    services::{
        audit::{self, client_ip, AuditEntry},
        users::UserService,
    },
    AppState,
};

/// List active users in the tenant.
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Admin)?;
    UserService::list(&state.db, &tenant)
        .await
        .map(|users| Json(json!(users)))
        .map_err(internal_error)
}

/// Create a user directly in the tenant.
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    headers: HeaderMap,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Admin)?;

    if body.role == Some(UserRole::SuperAdmin) {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid role" }))));
    }
    if !body.email.contains('@') || body.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "A valid email and a password of at least 8 characters are required" })),
        ));
    }

    let created = UserService::create(&state.db, &tenant, &body)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::CONFLICT, Json(json!({ "error": "Email already in use" }))))?;

    audit::log(state.db.clone(), &tenant, AuditEntry {
        user_id: Some(user.user_id),
        action: "user.created",
        resource_type: Some("user"),
        resource_id: Some(created.id.to_string()),
        ip_address: client_ip(&headers),
    });

    Ok((StatusCode::CREATED, Json(json!(created))))
}
