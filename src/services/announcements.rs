use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    models::announcement::{Announcement, CreateAnnouncementRequest, UpdateAnnouncementRequest},
};

/// What happened when a user reported viewing an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Recorded,
    AlreadyViewed,
    NotFound,
}

pub struct AnnouncementService;

impl AnnouncementService {
    /// Newest active announcement the user has not viewed yet.
    pub async fn latest_unviewed(
        pool: &PgPool,
        tenant: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Announcement>> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT a.* FROM {schema}.announcements a
             WHERE a.is_active = TRUE
               AND NOT EXISTS (
                 SELECT 1 FROM {schema}.announcement_views v
                 WHERE v.announcement_id = a.id AND v.user_id = $1
               )
             ORDER BY a.created_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Record a view. Viewing twice keeps the first timestamp.
    pub async fn mark_viewed(
        pool: &PgPool,
        tenant: &str,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<ViewOutcome> {
        let schema = schema_name(tenant);
        let inserted = sqlx::query(&format!(
            "INSERT INTO {schema}.announcement_views (announcement_id, user_id)
             SELECT id, $2 FROM {schema}.announcements WHERE id = $1
             ON CONFLICT (announcement_id, user_id) DO NOTHING"
        ))
        .bind(announcement_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            return Ok(ViewOutcome::Recorded);
        }

        // Nothing inserted: either already viewed or no such announcement
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM {schema}.announcements WHERE id = $1)"
        ))
        .bind(announcement_id)
        .fetch_one(pool)
        .await?;
        Ok(if exists { ViewOutcome::AlreadyViewed } else { ViewOutcome::NotFound })
    }

    pub async fn list(pool: &PgPool, tenant: &str) -> anyhow::Result<Vec<Announcement>> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT * FROM {schema}.announcements ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        pool: &PgPool,
        tenant: &str,
        author: Uuid,
        req: &CreateAnnouncementRequest,
    ) -> anyhow::Result<Announcement> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, Announcement>(&format!(
            "INSERT INTO {schema}.announcements
                (title, content, video_url, cta_url, is_active, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *"
        ))
        .bind(req.title.trim())
        .bind(&req.content)
        .bind(&req.video_url)
        .bind(&req.cta_url)
        .bind(req.is_active.unwrap_or(true))
        .bind(author)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Partial update; absent fields keep their value.
    pub async fn update(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &UpdateAnnouncementRequest,
    ) -> anyhow::Result<Option<Announcement>> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, Announcement>(&format!(
            "UPDATE {schema}.announcements
             SET title = COALESCE($1, title),
                 content = COALESCE($2, content),
                 video_url = COALESCE($3, video_url),
                 cta_url = COALESCE($4, cta_url),
                 is_active = COALESCE($5, is_active),
                 updated_at = NOW()
             WHERE id = $6
             RETURNING *"
        ))
        .bind(req.title.as_deref().map(str::trim))
        .bind(&req.content)
        .bind(&req.video_url)
        .bind(&req.cta_url)
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Returns `false` when nothing was deleted.
    pub async fn delete(pool: &PgPool, tenant: &str, id: Uuid) -> anyhow::Result<bool> {
        let schema = schema_name(tenant);
        let deleted = sqlx::query(&format!("DELETE FROM {schema}.announcements WHERE id = $1"))
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}
