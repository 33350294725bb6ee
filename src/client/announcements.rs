use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{http::{ApiClient, ClientError}, store::AnnouncementStore};
use crate::models::announcement::Announcement;

const LATEST_PATH: &str = "/v1/content/announcements/latest";

struct CachedLatest {
    fetched_at: Instant,
    value: Option<Announcement>,
}

/// Cached access to the announcement endpoints.
///
/// `latest` serves from cache until it is older than `stale_after`; concurrent
/// callers wait on the same fetch. `mark_viewed` invalidates the cache.
pub struct AnnouncementQueries {
    client: ApiClient,
    stale_after: Duration,
    cache: Mutex<Option<CachedLatest>>,
}

impl AnnouncementQueries {
    pub fn new(client: ApiClient, stale_after: Duration) -> Self {
        Self {
            client,
            stale_after,
            cache: Mutex::new(None),
        }
    }

    pub async fn latest(&self) -> Result<Option<Announcement>, ClientError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.stale_after {
                return Ok(cached.value.clone());
            }
        }

        let value: Option<Announcement> = self.client.get(LATEST_PATH).await?;
        *cache = Some(CachedLatest {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    pub async fn mark_viewed(&self, id: Uuid) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .client
            .post(&format!("/v1/content/announcements/{id}/view"), &serde_json::json!({}))
            .await?;
        self.invalidate().await;
        Ok(())
    }

    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

/// Wires the latest-announcement query to the banner store.
pub struct AnnouncementBanner {
    queries: AnnouncementQueries,
    store: Arc<AnnouncementStore>,
}

impl AnnouncementBanner {
    pub fn new(queries: AnnouncementQueries, store: Arc<AnnouncementStore>) -> Self {
        Self { queries, store }
    }

    /// Fetch the latest announcement and offer it to the store.
    /// Returns what the banner shows afterwards.
    pub async fn refresh(&self) -> Result<Option<Announcement>, ClientError> {
        if let Some(latest) = self.queries.latest().await? {
            self.store.set_announcement(latest);
        }
        Ok(self.store.current())
    }

    /// Hide the banner and report the view to the API.
    pub async fn dismiss(&self) -> Result<(), ClientError> {
        match self.store.hide() {
            Some(announcement) => self.queries.mark_viewed(announcement.id).await,
            None => Ok(()),
        }
    }
}
