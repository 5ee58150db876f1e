//! Video controller seam.
//!
//! The browser side picks the video element on a tab and applies seeks. The
//! coordinator only ever talks to it through [`VideoController`], so the
//! native-messaging bridge and the test doubles are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::HeldAction;

/// Browser tab identifier as reported by the extension.
pub type TabId = i64;

/// Seconds moved per seek step.
pub const SEEK_STEP_SECONDS: f64 = 10.0;

/// Signed seek delta for an action: negative for rewind, positive for forward.
pub fn seek_delta(action: HeldAction, step_seconds: f64) -> f64 {
    match action {
        HeldAction::Rewind => -step_seconds,
        HeldAction::Forward => step_seconds,
    }
}

/// Playback status of the video picked on a tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub has_video: bool,
    pub is_playing: bool,
}

/// Why a tab refused a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekFailureReason {
    NoVideo,
    SeekFailed,
}

/// Answer to a seek command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SeekFailureReason>,
}

impl SeekResponse {
    pub fn success() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn failure(reason: SeekFailureReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

/// A command could not complete its round trip to the tab.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("controller disconnected")]
    Disconnected,
}

/// Request/response operations against the browser's tabs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoController: Send + Sync {
    /// Active tab of the current window, if any.
    async fn query_active_tab(&self) -> Result<Option<TabId>, ControllerError>;

    async fn query_video_status(&self, tab_id: TabId) -> Result<VideoStatus, ControllerError>;

    async fn send_seek(&self, tab_id: TabId, delta_seconds: f64)
        -> Result<SeekResponse, ControllerError>;
}

/// Collapse a seek round trip into the boolean the fail-count policy needs.
pub fn seek_succeeded(result: &Result<SeekResponse, ControllerError>) -> bool {
    matches!(result, Ok(SeekResponse { ok: true, .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_delta_sign() {
        assert_eq!(seek_delta(HeldAction::Rewind, SEEK_STEP_SECONDS), -10.0);
        assert_eq!(seek_delta(HeldAction::Forward, SEEK_STEP_SECONDS), 10.0);
    }

    #[test]
    fn test_seek_succeeded_requires_ok_flag() {
        assert!(seek_succeeded(&Ok(SeekResponse::success())));
        assert!(!seek_succeeded(&Ok(SeekResponse::failure(
            SeekFailureReason::NoVideo
        ))));
        assert!(!seek_succeeded(&Err(ControllerError::Timeout)));
    }

    #[test]
    fn test_seek_response_wire_shape() {
        let parsed: SeekResponse =
            serde_json::from_str(r#"{"ok":false,"reason":"seek_failed"}"#).unwrap();
        assert_eq!(parsed, SeekResponse::failure(SeekFailureReason::SeekFailed));

        let parsed: SeekResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert_eq!(parsed, SeekResponse::success());
    }

    #[test]
    fn test_video_status_camel_case() {
        let parsed: VideoStatus =
            serde_json::from_str(r#"{"hasVideo":true,"isPlaying":false}"#).unwrap();
        assert!(parsed.has_video);
        assert!(!parsed.is_playing);
    }
}
