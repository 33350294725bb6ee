use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    middleware::{roles::require_role, tenant::TenantSlug},
    models::{
        announcement::{CreateAnnouncementRequest, UpdateAnnouncementRequest},
        auth::AuthenticatedUser,
        user::UserRole,
    },
    routes::internal_error,
    services::{
        announcements::{AnnouncementService, ViewOutcome},
        audit::{self, client_ip, AuditEntry},
        metrics::{ANNOUNCEMENTS_CREATED_COUNTER, ANNOUNCEMENT_VIEWS_COUNTER},
    },
    AppState,
};

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Announcement not found" })))
}

/// GET /v1/content/announcements/latest: newest active announcement the
/// caller has not viewed, or null.
pub async fn latest(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let row = AnnouncementService::latest_unviewed(&state.db, &tenant, user.user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!(row)))
}

/// POST /v1/content/announcements/{id}/view
pub async fn mark_viewed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let outcome = AnnouncementService::mark_viewed(&state.db, &tenant, id, user.user_id)
        .await
        .map_err(internal_error)?;
    view_response(&tenant, outcome)
}

/// Only first views count towards the views metric.
fn view_response(tenant: &str, outcome: ViewOutcome) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match outcome {
        ViewOutcome::NotFound => Err(not_found()),
        ViewOutcome::Recorded => {
            ANNOUNCEMENT_VIEWS_COUNTER.with_label_values(&[tenant]).inc();
            Ok(Json(json!({ "ok": true })))
        }
        ViewOutcome::AlreadyViewed => Ok(Json(json!({ "ok": true }))),
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Editor)?;
    AnnouncementService::list(&state.db, &tenant)
        .await
        .map(|rows| Json(json!(rows)))
        .map_err(internal_error)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    headers: HeaderMap,
    Json(body): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Editor)?;
    body.validate()
        .map_err(|msg| (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))))?;

    let created = AnnouncementService::create(&state.db, &tenant, user.user_id, &body)
        .await
        .map_err(internal_error)?;

    ANNOUNCEMENTS_CREATED_COUNTER.with_label_values(&[&tenant]).inc();
    audit::log(state.db.clone(), &tenant, AuditEntry {
        user_id: Some(user.user_id),
        action: "announcement.created",
        resource_type: Some("announcement"),
        resource_id: Some(created.id.to_string()),
        ip_address: client_ip(&headers),
    });

    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Editor)?;
    body.validate()
        .map_err(|msg| (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))))?;

    let updated = AnnouncementService::update(&state.db, &tenant, id, &body)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    audit::log(state.db.clone(), &tenant, AuditEntry {
        user_id: Some(user.user_id),
        action: "announcement.updated",
        resource_type: Some("announcement"),
        resource_id: Some(id.to_string()),
        ip_address: client_ip(&headers),
    });

    Ok(Json(json!(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    TenantSlug(tenant): TenantSlug,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_role(&user, UserRole::Admin)?;
    let deleted = AnnouncementService::delete(&state.db, &tenant, id)
        .await
        .map_err(internal_error)?;
    if !deleted {
        return Err(not_found());
    }

    audit::log(state.db.clone(), &tenant, AuditEntry {
        user_id: Some(user.user_id),
        action: "announcement.deleted",
        resource_type: Some("announcement"),
        resource_id: Some(id.to_string()),
        ip_address: client_ip(&headers),
    });

    Ok(Json(json!({ "ok": true })))
}
