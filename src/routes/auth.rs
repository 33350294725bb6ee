use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    middleware::{rate_limit::check_rate_limit, tenant::TenantSlug},
    models::{
        auth::AuthenticatedUser,
        user::{LoginRequest, RefreshTokenRequest},
    },
    routes::internal_error,
    services::auth::{AuthError, AuthService, TokenSettings},
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let rate_key = format!("rate:login:{}:{}", tenant, body.email.trim().to_lowercase());
    check_rate_limit(
        &state.redis,
        &rate_key,
        state.config.login_max_attempts,
        state.config.login_window_seconds,
    )
    .await?;

    let tokens = TokenSettings::from(&*state.config);
    AuthService::login(&state.db, &tenant, &body.email, &body.password, &tokens)
        .await
        .map(|res| Json(json!(res)))
        .map_err(|e| {
            if matches!(e, AuthError::InvalidCredentials) {
                tracing::info!(tenant = %tenant, "login rejected");
            }
            auth_error(e)
        })
}

pub async fn refresh_token(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tokens = TokenSettings::from(&*state.config);
    AuthService::refresh(&state.db, &tenant, &body.refresh_token, &tokens)
        .await
        .map(|res| Json(json!(res)))
        .map_err(auth_error)
}

pub async fn logout(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    AuthService::logout(&state.db, &tenant, &body.refresh_token, &state.config.jwt_refresh_secret)
        .await
        .map(|_| Json(json!({ "ok": true })))
        .map_err(internal_error)
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match AuthService::me(&state.db, &tenant, user.user_id).await {
        Ok(Some(profile)) => Ok(Json(json!(profile))),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "User not found or inactive" })))),
        Err(e) => Err(internal_error(e)),
    }
}

/// Credential and token problems are 401. Anything else is logged and hidden.
fn auth_error(e: AuthError) -> (StatusCode, Json<Value>) {
    match e {
        AuthError::Other(inner) => internal_error(inner),
        e => (StatusCode::UNAUTHORIZED, Json(json!({ "error": e.to_string() }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_credentials_are_unauthorized() {
        let (status, body) = auth_error(AuthError::InvalidCredentials);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.0["error"], "Invalid email or password");

        let (status, _) = auth_error(AuthError::InvalidToken);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn database_failures_are_server_errors_without_details() {
        let cause = anyhow::anyhow!("relation \"tenant_acme.users\" does not exist");
        let (status, body) = auth_error(AuthError::Other(cause));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0["error"], "Internal server error");
    }
}
