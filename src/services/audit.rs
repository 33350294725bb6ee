use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::tenant::schema_name;

/// An audit log entry to record.
pub struct AuditEntry {
    pub user_id:       Option<Uuid>,
    pub action:        &'static str,
    pub resource_type: Option<&'static str>,
    pub resource_id:   Option<String>,
    pub ip_address:    String,
}

/// Fire-and-forget audit log entry.
/// Spawns a background task so the request handler never waits on it;
/// failures are logged, not propagated.
pub fn log(pool: PgPool, tenant: &str, entry: AuditEntry) {
    let schema = schema_name(tenant);

    tokio::spawn(async move {
        let res = sqlx::query(&format!(
            "INSERT INTO {schema}.audit_log
                (user_id, action, resource_type, resource_id, ip_address)
             VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.ip_address)
        .execute(&pool)
        .await;

        if let Err(e) = res {
            tracing::warn!("audit log insert failed for schema {schema}: {e}");
        }
    });
}

/// Best-effort client address from reverse-proxy headers.
pub fn client_ip(h: &HeaderMap) -> String {
    h.get("x-real-ip").and_then(|v| v.to_str().ok())
        .or_else(|| h.get("x-forwarded-for").and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next()).map(|s| s.trim()))
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_real_ip_then_first_forwarded() {
        let mut h = HeaderMap::new();
        assert_eq!(client_ip(&h), "unknown");

        h.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&h), "10.0.0.1");

        h.insert("x-real-ip", "192.168.1.5".parse().unwrap());
        assert_eq!(client_ip(&h), "192.168.1.5");
    }
}
