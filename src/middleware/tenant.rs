use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::db::tenant::is_valid_slug;
use crate::AppState;

/// Extracts the tenant slug from the `X-Tenant` header or first subdomain,
/// then validates the tenant exists and is active.
#[derive(Debug, Clone)]
pub struct TenantSlug(pub String);

impl FromRequestParts<AppState> for TenantSlug {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT is_active FROM public.tenants WHERE slug = $1",
        )
        .bind(&slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("tenant lookup failed for {slug}: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database error" })))
        })?;

        match row {
            None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Tenant not found" })))),
            Some((false,)) => Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Account is inactive" })))),
            Some(_) => Ok(TenantSlug(slug)),
        }
    }
}

/// Resolve the tenant slug without touching the database.
pub fn extract_slug(parts: &Parts) -> Result<String, (StatusCode, Json<Value>)> {
    // 1. X-Tenant header
    if let Some(tenant) = parts
        .headers
        .get("X-Tenant")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !is_valid_slug(&tenant) {
            return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid tenant identifier" }))));
        }
        return Ok(tenant);
    }

    // 2. Subdomain from Host header
    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        let domain = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() >= 3 {
            let subdomain = labels[0].to_lowercase();
            if subdomain != "www" && subdomain != "api" {
                if !is_valid_slug(&subdomain) {
                    return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid tenant identifier" }))));
                }
                return Ok(subdomain);
            }
        }
    }

    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing X-Tenant header" }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/content/announcements/latest");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_takes_precedence_and_is_lowercased() {
        let p = parts(&[("X-Tenant", "Acme"), ("Host", "other.example.com")]);
        assert_eq!(extract_slug(&p).unwrap(), "acme");
    }

    #[test]
    fn falls_back_to_subdomain() {
        let p = parts(&[("Host", "globex.noticeboard.app:443")]);
        assert_eq!(extract_slug(&p).unwrap(), "globex");
    }

    #[test]
    fn ignores_www_and_api_subdomains() {
        let p = parts(&[("Host", "api.noticeboard.app")]);
        let (status, _) = extract_slug(&p).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_invalid_header_slug() {
        let p = parts(&[("X-Tenant", "bad_slug")]);
        let (status, body) = extract_slug(&p).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["error"], "Invalid tenant identifier");
    }
}
