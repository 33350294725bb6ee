use std::sync::RwLock;

use crate::models::announcement::Announcement;

#[derive(Debug, Default)]
struct BannerState {
    announcement: Option<Announcement>,
    visible: bool,
}

/// Process-wide holder for the announcement banner.
#[derive(Debug, Default)]
pub struct AnnouncementStore {
    state: RwLock<BannerState>,
}

impl AnnouncementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `announcement` unless one is already being shown.
    /// Returns whether the store changed.
    pub fn set_announcement(&self, announcement: Announcement) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.visible && state.announcement.is_some() {
            return false;
        }
        state.announcement = Some(announcement);
        state.visible = true;
        true
    }

    /// Dismiss the banner, keeping the record so its id can still be reported.
    pub fn hide(&self) -> Option<Announcement> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.visible = false;
        state.announcement.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = BannerState::default();
    }

    /// The announcement currently on screen, if any.
    pub fn current(&self) -> Option<Announcement> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.visible {
            state.announcement.clone()
        } else {
            None
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).visible
    }
}
