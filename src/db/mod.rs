pub mod tenant;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to Postgres: {e}"))
}

/// Apply ./migrations (public schema: extensions and the tenant registry).
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Bring every active tenant schema up to date. Provisioning is idempotent.
pub async fn migrate_all_existing_tenants(pool: &PgPool) -> anyhow::Result<()> {
    let slugs: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.tenants WHERE is_active = TRUE ORDER BY slug")
            .fetch_all(pool)
            .await?;

    let mut conn = pool.acquire().await?;
    for slug in &slugs {
        tenant::provision_tenant_schema(&mut *conn, slug).await?;
    }
    tracing::info!(count = slugs.len(), "tenant schemas up to date");
    Ok(())
}
