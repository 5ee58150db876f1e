use std::sync::Arc;

use crate::media::{TabId, VideoController, VideoStatus};

/// Picks the tab that should receive seeks on the first press of a sequence.
pub struct TargetResolver {
    controller: Arc<dyn VideoController>,
}

impl TargetResolver {
    pub fn new(controller: Arc<dyn VideoController>) -> Self {
        Self { controller }
    }

    /// First match wins:
    /// 1. the active tab, if it is playing video;
    /// 2. the remembered tab, if it is still playing;
    /// 3. the active tab, if it has any video at all.
    ///
    /// A failed round trip counts as "no video" for that step only.
    pub async fn resolve_target(&self, last_active_playing: Option<TabId>) -> Option<TabId> {
        let active = match self.controller.query_active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                log::debug!("[HOLD] Active tab query failed: {}", e);
                None
            }
        };

        let active_status = match active {
            Some(tab_id) => self.status_of(tab_id).await,
            None => VideoStatus::default(),
        };

        if let Some(tab_id) = active {
            if active_status.is_playing {
                log::debug!("[HOLD] Target: active tab {} is playing", tab_id);
                return Some(tab_id);
            }
        }

        if let Some(remembered) = last_active_playing {
            if self.status_of(remembered).await.is_playing {
                log::debug!("[HOLD] Target: remembered tab {} still playing", remembered);
                return Some(remembered);
            }
        }

        if let Some(tab_id) = active {
            if active_status.has_video {
                log::debug!("[HOLD] Target: active tab {} has video", tab_id);
                return Some(tab_id);
            }
        }

        log::debug!("[HOLD] No target tab found");
        None
    }

    async fn status_of(&self, tab_id: TabId) -> VideoStatus {
        match self.controller.query_video_status(tab_id).await {
            Ok(status) => status,
            Err(e) => {
                log::debug!("[HOLD] Status query for tab {} failed: {}", tab_id, e);
                VideoStatus::default()
            }
        }
    }
}
