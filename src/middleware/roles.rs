use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use crate::models::{auth::AuthenticatedUser, user::UserRole};

/// Reject the request with 403 unless the caller holds at least `minimum`.
pub fn require_role(
    user: &AuthenticatedUser,
    minimum: UserRole,
) -> Result<(), (StatusCode, Json<Value>)> {
    if user.role.at_least(minimum) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.user_id, role = %user.role, required = %minimum, "role check failed");
        Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Access denied" }))))
    }
}
