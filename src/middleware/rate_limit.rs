use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Checks a rate limit counter stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Returns 429 if counter exceeds `max_attempts`
///
/// Redis being unreachable fails open: the request is allowed and a warning logged.
pub async fn check_rate_limit(
    redis: &redis::Client,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), (StatusCode, Json<Value>)> {
    let mut conn = match redis.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("rate limit skipped for {key}: redis unavailable: {e}");
            return Ok(());
        }
    };

    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(&mut conn)
        .await
        .unwrap_or(0);

    if count == 1 {
        // Set TTL only on first increment so retries don't extend the window
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut conn)
            .await;
    }

    if count > max_attempts {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many attempts. Try again in a few minutes." })),
        ));
    }

    Ok(())
}
