use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub cta_url: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub cta_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub cta_url: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateAnnouncementRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        if self.content.trim().is_empty() {
            return Err("Content is required".into());
        }
        validate_url("video_url", self.video_url.as_deref())?;
        validate_url("cta_url", self.cta_url.as_deref())?;
        Ok(())
    }
}

impl UpdateAnnouncementRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if matches!(&self.content, Some(c) if c.trim().is_empty()) {
            return Err("Content cannot be empty".into());
        }
        validate_url("video_url", self.video_url.as_deref())?;
        validate_url("cta_url", self.cta_url.as_deref())?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title is required".into());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {MAX_TITLE_LEN} characters"));
    }
    Ok(())
}

fn validate_url(field: &str, url: Option<&str>) -> Result<(), String> {
    match url {
        Some(u) if !(u.starts_with("https://") || u.starts_with("http://")) => {
            Err(format!("{field} must be an http(s) URL"))
        }
        _ => Ok(()),
    }
}
