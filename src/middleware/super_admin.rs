use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::AppState;

pub const SUPER_ADMIN_HEADER: &str = "X-Super-Admin-Key";

/// Platform-operator access for `/v1/super-admin/*`. Carries no user identity.
pub struct SuperAdminAuth;

impl FromRequestParts<AppState> for SuperAdminAuth {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(SUPER_ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| rejected("Missing X-Super-Admin-Key header"))?;

        if !key_matches(provided, &state.config.super_admin_key) {
            tracing::warn!(uri = %parts.uri, "super-admin key rejected");
            return Err(rejected("Invalid super-admin key"));
        }

        Ok(SuperAdminAuth)
    }
}

fn rejected(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg })))
}

/// Compare fixed-length digests so the comparison time does not depend on
/// how much of the key is right. An empty configured key matches nothing.
fn key_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_is_accepted() {
        assert!(key_matches("platform-key", "platform-key"));
    }

    #[test]
    fn wrong_or_prefix_key_is_rejected() {
        assert!(!key_matches("platform", "platform-key"));
        assert!(!key_matches("platform-key-2", "platform-key"));
    }

    #[test]
    fn unset_key_never_matches() {
        assert!(!key_matches("", ""));
    }
}
