//! Tests against a real Postgres. They run when `TEST_DATABASE_URL` (or
//! `DATABASE_URL`) is set and are skipped otherwise. Each test works in its
//! own freshly created tenant and drops it at the end.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::util::ServiceExt;
use uuid::Uuid;

use noticeboard_api::{
    app::build_router,
    config::Config,
    db::{self, tenant::schema_name},
    models::{
        announcement::CreateAnnouncementRequest,
        tenant::CreateTenantRequest,
        user::{CreateUserRequest, UserRole},
    },
    services::{
        announcements::{AnnouncementService, ViewOutcome},
        auth::{AuthError, AuthService, TokenSettings},
        tenants::{TenantError, TenantService},
        users::UserService,
    },
    AppState,
};

const JWT_SECRET: &str = "db-test-secret";
const ADMIN_PASSWORD: &str = "admin-password";

struct Harness {
    pool: PgPool,
    app: Router,
    config: Arc<Config>,
}

async fn harness() -> Option<Harness> {
    let Some(url) = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
    else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&url)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let config = Arc::new(Config {
        database_url: url,
        // Nothing listens here; the login throttle fails open.
        redis_url: "redis://127.0.0.1:1".into(),
        jwt_secret: JWT_SECRET.into(),
        jwt_refresh_secret: "db-test-refresh".into(),
        jwt_expiry_seconds: 900,
        jwt_refresh_expiry_days: 30,
        host: "127.0.0.1".into(),
        port: 0,
        super_admin_key: "db-test-super-admin".into(),
        app_base_url: "http://localhost".into(),
        login_max_attempts: 100,
        login_window_seconds: 60,
    });
    let app = build_router(AppState {
        db: pool.clone(),
        redis: redis::Client::open(config.redis_url.as_str()).unwrap(),
        config: config.clone(),
    });

    Some(Harness { pool, app, config })
}

fn unique_slug() -> String {
    format!("t{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn tenant_request(slug: &str) -> CreateTenantRequest {
    CreateTenantRequest {
        slug: slug.into(),
        name: format!("Tenant {slug}"),
        admin_email: format!("admin@{slug}.test"),
        admin_password: ADMIN_PASSWORD.into(),
        admin_first_name: None,
        admin_last_name: None,
    }
}

async fn drop_tenant(pool: &PgPool, slug: &str) {
    sqlx::raw_sql(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name(slug)))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM public.tenants WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await
        .unwrap();
}

async fn add_user(pool: &PgPool, tenant: &str, role: UserRole) -> Uuid {
    let req = CreateUserRequest {
        email: format!("{}@{tenant}.test", Uuid::new_v4().simple()),
        first_name: "Test".into(),
        last_name: role.to_string(),
        password: "user-password".into(),
        role: Some(role),
    };
    UserService::create(pool, tenant, &req).await.unwrap().unwrap().id
}

fn bearer(user_id: Uuid, tenant: &str, role: UserRole) -> String {
    let token =
        AuthService::generate_access_token(user_id, role, tenant, JWT_SECRET, 600).unwrap();
    format!("Bearer {token}")
}

fn announcement(title: &str, active: bool) -> CreateAnnouncementRequest {
    CreateAnnouncementRequest {
        title: title.into(),
        content: format!("{title} body"),
        video_url: None,
        cta_url: Some("https://example.com/more".into()),
        is_active: Some(active),
    }
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    tenant: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Tenant", tenant);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn latest_walks_unviewed_active_announcements_newest_first() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    let editor = add_user(&h.pool, &slug, UserRole::Editor).await;
    let member = add_user(&h.pool, &slug, UserRole::Member).await;

    let older = AnnouncementService::create(&h.pool, &slug, editor, &announcement("older", true))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = AnnouncementService::create(&h.pool, &slug, editor, &announcement("newer", true))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    AnnouncementService::create(&h.pool, &slug, editor, &announcement("draft", false))
        .await
        .unwrap();

    let latest = AnnouncementService::latest_unviewed(&h.pool, &slug, member).await.unwrap();
    assert_eq!(latest.map(|a| a.id), Some(newer.id));

    let outcome = AnnouncementService::mark_viewed(&h.pool, &slug, newer.id, member).await.unwrap();
    assert_eq!(outcome, ViewOutcome::Recorded);
    let latest = AnnouncementService::latest_unviewed(&h.pool, &slug, member).await.unwrap();
    assert_eq!(latest.map(|a| a.id), Some(older.id));

    AnnouncementService::mark_viewed(&h.pool, &slug, older.id, member).await.unwrap();
    let latest = AnnouncementService::latest_unviewed(&h.pool, &slug, member).await.unwrap();
    assert!(latest.is_none());

    // Another user still sees the newest one.
    let latest = AnnouncementService::latest_unviewed(&h.pool, &slug, editor).await.unwrap();
    assert_eq!(latest.map(|a| a.id), Some(newer.id));

    drop_tenant(&h.pool, &slug).await;
}

async fn viewed_at(
    pool: &PgPool,
    tenant: &str,
    announcement_id: Uuid,
    user_id: Uuid,
) -> chrono::DateTime<chrono::Utc> {
    sqlx::query_scalar(&format!(
        "SELECT viewed_at FROM {}.announcement_views WHERE announcement_id = $1 AND user_id = $2",
        schema_name(tenant)
    ))
    .bind(announcement_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn repeat_view_keeps_first_timestamp() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    let member = add_user(&h.pool, &slug, UserRole::Member).await;
    let a = AnnouncementService::create(&h.pool, &slug, member, &announcement("once", true))
        .await
        .unwrap();

    let first = AnnouncementService::mark_viewed(&h.pool, &slug, a.id, member).await.unwrap();
    assert_eq!(first, ViewOutcome::Recorded);
    let stamp = viewed_at(&h.pool, &slug, a.id, member).await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let again = AnnouncementService::mark_viewed(&h.pool, &slug, a.id, member).await.unwrap();
    assert_eq!(again, ViewOutcome::AlreadyViewed);
    assert_eq!(viewed_at(&h.pool, &slug, a.id, member).await, stamp);

    let missing = AnnouncementService::mark_viewed(&h.pool, &slug, Uuid::new_v4(), member)
        .await
        .unwrap();
    assert_eq!(missing, ViewOutcome::NotFound);

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn announcement_routes_enforce_roles_and_existence() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    let member = bearer(add_user(&h.pool, &slug, UserRole::Member).await, &slug, UserRole::Member);
    let editor = bearer(add_user(&h.pool, &slug, UserRole::Editor).await, &slug, UserRole::Editor);
    let admin = bearer(add_user(&h.pool, &slug, UserRole::Admin).await, &slug, UserRole::Admin);

    let body = json!({
        "title": "Maintenance window",
        "content": "Saturday 02:00 UTC",
        "cta_url": "https://status.example.com"
    });
    let (status, _) =
        call(&h.app, "POST", "/v1/content/announcements", &slug, Some(&member), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) =
        call(&h.app, "POST", "/v1/content/announcements", &slug, Some(&editor), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, latest) =
        call(&h.app, "GET", "/v1/content/announcements/latest", &slug, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], id.as_str());

    // Partial update leaves the other fields alone.
    let (status, updated) = call(
        &h.app,
        "PUT",
        &format!("/v1/content/announcements/{id}"),
        &slug,
        Some(&editor),
        Some(json!({ "title": "Maintenance moved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Maintenance moved");
    assert_eq!(updated["content"], "Saturday 02:00 UTC");
    assert_eq!(updated["cta_url"], "https://status.example.com");

    let missing = format!("/v1/content/announcements/{}/view", Uuid::new_v4());
    let (status, _) = call(&h.app, "POST", &missing, &slug, Some(&member), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let view = format!("/v1/content/announcements/{id}/view");
    let (status, _) = call(&h.app, "POST", &view, &slug, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, latest) =
        call(&h.app, "GET", "/v1/content/announcements/latest", &slug, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(latest.is_null());

    let target = format!("/v1/content/announcements/{id}");
    let (status, _) = call(&h.app, "DELETE", &target, &slug, Some(&editor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&h.app, "DELETE", &target, &slug, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&h.app, "DELETE", &target, &slug, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn duplicate_user_email_conflicts() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    let admin = bearer(add_user(&h.pool, &slug, UserRole::Admin).await, &slug, UserRole::Admin);

    let body = json!({
        "email": "Dana@Example.test",
        "first_name": "Dana",
        "last_name": "Lee",
        "password": "long-enough",
        "role": "editor"
    });
    let (status, created) =
        call(&h.app, "POST", "/v1/users", &slug, Some(&admin), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email"], "dana@example.test");
    assert_eq!(created["role"], "editor");

    let (status, err) = call(&h.app, "POST", "/v1/users", &slug, Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "Email already in use");

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn duplicate_tenant_slug_conflicts() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();

    let err = TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap_err();
    assert!(matches!(err, TenantError::AlreadyExists(ref s) if *s == slug));

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn failed_tenant_creation_leaves_the_slug_free() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    let schema = schema_name(&slug);

    // A leftover users table with the wrong key type makes provisioning fail
    // after the tenant row has been inserted.
    sqlx::raw_sql(&format!(
        "CREATE SCHEMA {schema}; CREATE TABLE {schema}.users (id INTEGER PRIMARY KEY)"
    ))
    .execute(&h.pool)
    .await
    .unwrap();

    let err = TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap_err();
    assert!(matches!(err, TenantError::Other(_)));

    let registered: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM public.tenants WHERE slug = $1)")
            .bind(&slug)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert!(!registered);

    sqlx::raw_sql(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&h.pool)
        .await
        .unwrap();
    let tenant = TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    assert_eq!(tenant.slug, slug);

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn reprovision_requires_a_registered_tenant() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();

    let err = TenantService::reprovision(&h.pool, &slug).await.unwrap_err();
    assert!(matches!(err, TenantError::NotFound(_)));

    TenantService::create(&h.pool, &tenant_request(&slug)).await.unwrap();
    TenantService::reprovision(&h.pool, &slug).await.unwrap();

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn concurrent_refresh_with_one_token_succeeds_once() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    let req = tenant_request(&slug);
    TenantService::create(&h.pool, &req).await.unwrap();
    let tokens = TokenSettings::from(&*h.config);

    let session = AuthService::login(&h.pool, &slug, &req.admin_email, ADMIN_PASSWORD, &tokens)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        AuthService::refresh(&h.pool, &slug, &session.refresh_token, &tokens),
        AuthService::refresh(&h.pool, &slug, &session.refresh_token, &tokens),
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "a: {a:?}, b: {b:?}");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(AuthError::InvalidToken)));

    let replay = AuthService::refresh(&h.pool, &slug, &session.refresh_token, &tokens).await;
    assert!(matches!(replay, Err(AuthError::InvalidToken)));

    drop_tenant(&h.pool, &slug).await;
}

#[tokio::test]
async fn login_database_failure_is_a_server_error() {
    let Some(h) = harness().await else { return };
    let slug = unique_slug();
    let req = tenant_request(&slug);
    TenantService::create(&h.pool, &req).await.unwrap();

    let body = json!({ "email": req.admin_email, "password": ADMIN_PASSWORD });
    let (status, _) = call(&h.app, "POST", "/v1/auth/login", &slug, None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let wrong = json!({ "email": req.admin_email, "password": "not-the-password" });
    let (status, err) = call(&h.app, "POST", "/v1/auth/login", &slug, None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "Invalid email or password");

    sqlx::raw_sql(&format!("DROP TABLE {}.users CASCADE", schema_name(&slug)))
        .execute(&h.pool)
        .await
        .unwrap();
    let (status, err) = call(&h.app, "POST", "/v1/auth/login", &slug, None, Some(body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"], "Internal server error");

    drop_tenant(&h.pool, &slug).await;
}
