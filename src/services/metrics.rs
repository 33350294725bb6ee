use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::tenant::schema_name;

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by tenant and status",
        &["tenant", "status"]
    ).unwrap();

    pub static ref ANNOUNCEMENTS_CREATED_COUNTER: CounterVec = register_counter_vec!(
        "api_announcements_created_total",
        "Announcements created by tenant",
        &["tenant"]
    ).unwrap();

    pub static ref ANNOUNCEMENT_VIEWS_COUNTER: CounterVec = register_counter_vec!(
        "api_announcement_views_total",
        "Announcement views recorded by tenant",
        &["tenant"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref USERS_GAUGE: GaugeVec = register_gauge_vec!(
        "tenant_users_total",
        "Active users by tenant and role",
        &["tenant", "role"]
    ).unwrap();

    pub static ref ACTIVE_ANNOUNCEMENTS_GAUGE: GaugeVec = register_gauge_vec!(
        "tenant_announcements_active_total",
        "Active announcements by tenant",
        &["tenant"]
    ).unwrap();

    pub static ref TENANTS_GAUGE: Gauge = register_gauge!(
        "tenants_active_total",
        "Number of active tenants"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let tenants: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.tenants WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    TENANTS_GAUGE.set(tenants.len() as f64);

    for slug in &tenants {
        let schema = schema_name(slug);

        let user_counts: Vec<(String, i64)> = sqlx::query_as(&format!(
            r#"SELECT role::TEXT, COUNT(*)::BIGINT FROM "{schema}".users WHERE is_active = TRUE GROUP BY role"#
        ))
        .fetch_all(pool)
        .await
        .unwrap_or_default();

        for (role, count) in user_counts {
            USERS_GAUGE.with_label_values(&[slug, &role]).set(count as f64);
        }

        let active: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".announcements WHERE is_active = TRUE"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        ACTIVE_ANNOUNCEMENTS_GAUGE.with_label_values(&[slug]).set(active as f64);
    }

    info!("Metrics: collected for {} tenant(s)", tenants.len());
    Ok(())
}
