use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{middleware::auth::JwtSecret, routes, AppState};

/// Build the full HTTP router around `state`.
pub fn build_router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());
    let cors = cors_layer(state.config.app_base_url.clone());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .route("/v1/tenant/info", get(routes::tenant_info::get_tenant_info))
        // Auth
        .route("/v1/auth/login", post(routes::auth::login))
        .route("/v1/auth/refresh", post(routes::auth::refresh_token))
        .route("/v1/auth/logout", post(routes::auth::logout))
        .route("/v1/auth/me", get(routes::auth::me))
        // Content
        .route("/v1/content/announcements", get(routes::announcements::list).post(routes::announcements::create))
        .route("/v1/content/announcements/latest", get(routes::announcements::latest))
        .route("/v1/content/announcements/{id}", put(routes::announcements::update).delete(routes::announcements::delete))
        .route("/v1/content/announcements/{id}/view", post(routes::announcements::mark_viewed))
        // Tenant user management
        .route("/v1/users", get(routes::users::list_users).post(routes::users::create_user))
        // Super-admin
        .route("/v1/super-admin/tenants", get(routes::tenants::list_tenants).post(routes::tenants::create_tenant))
        .route("/v1/super-admin/tenants/{slug}", axum::routing::delete(routes::tenants::deactivate_tenant))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Allow the app base domain and its tenant subdomains.
/// Localhost origins are always allowed for development.
fn cors_layer(base: String) -> CorsLayer {
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin.to_str().map(|o| origin_allowed(o, &base)).unwrap_or(false)
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-tenant"),
            header::HeaderName::from_static("x-super-admin-key"),
        ]))
        .allow_origin(origin)
}

pub(crate) fn origin_allowed(origin: &str, base: &str) -> bool {
    if origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1") {
        return true;
    }
    if origin == base {
        return true;
    }
    // Subdomain match: *.domain of the base URL, same scheme
    if let Some(idx) = base.find("://") {
        let scheme = &base[..idx + 3];
        let after_scheme = &base[idx + 3..];
        let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
        let domain = domain.split(':').next().unwrap_or(domain);
        if let Some(host) = origin.strip_prefix(scheme) {
            let host = host.split(':').next().unwrap_or(host);
            return host.ends_with(&format!(".{domain}"));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins() {
        let base = "https://noticeboard.app";
        assert!(origin_allowed("https://noticeboard.app", base));
        assert!(origin_allowed("https://acme.noticeboard.app", base));
        assert!(origin_allowed("http://localhost:3000", base));
        assert!(!origin_allowed("https://noticeboard.app.evil.com", base));
        assert!(!origin_allowed("https://evilnoticeboard.app", base));
        assert!(!origin_allowed("http://acme.noticeboard.app", base));
    }
}
