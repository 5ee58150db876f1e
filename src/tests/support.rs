use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::hid::{ConnectHint, DeviceLink};
use crate::media::{
    ControllerError, SeekFailureReason, SeekResponse, TabId, VideoController, VideoStatus,
};
use crate::settings::RepeatSettings;
use crate::state::StateSnapshot;

pub const PLAYING: VideoStatus = VideoStatus {
    has_video: true,
    is_playing: true,
};
pub const PAUSED: VideoStatus = VideoStatus {
    has_video: true,
    is_playing: false,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekCall {
    pub tab_id: TabId,
    pub delta: f64,
    pub at: Instant,
}

/// Scriptable browser: active tab, per-tab status and queued seek outcomes.
/// Seeks succeed once the script runs out.
#[derive(Default)]
pub struct FakeBrowser {
    active: Mutex<Option<TabId>>,
    statuses: Mutex<HashMap<TabId, VideoStatus>>,
    seek_script: Mutex<VecDeque<bool>>,
    seeks: Mutex<Vec<SeekCall>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_active(self: &Arc<Self>, tab_id: TabId, status: VideoStatus) -> Arc<Self> {
        *self.active.lock().unwrap() = Some(tab_id);
        self.set_status(tab_id, status);
        self.clone()
    }

    pub fn set_status(&self, tab_id: TabId, status: VideoStatus) {
        self.statuses.lock().unwrap().insert(tab_id, status);
    }

    pub fn script_seeks(&self, outcomes: &[bool]) {
        self.seek_script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn seeks(&self) -> Vec<SeekCall> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn seek_count(&self) -> usize {
        self.seeks.lock().unwrap().len()
    }
}

#[async_trait]
impl VideoController for FakeBrowser {
    async fn query_active_tab(&self) -> Result<Option<TabId>, ControllerError> {
        Ok(*self.active.lock().unwrap())
    }

    async fn query_video_status(&self, tab_id: TabId) -> Result<VideoStatus, ControllerError> {
        self.statuses
            .lock()
            .unwrap()
            .get(&tab_id)
            .copied()
            .ok_or_else(|| ControllerError::Transport(format!("no receiver in tab {}", tab_id)))
    }

    async fn send_seek(
        &self,
        tab_id: TabId,
        delta_seconds: f64,
    ) -> Result<SeekResponse, ControllerError> {
        self.seeks.lock().unwrap().push(SeekCall {
            tab_id,
            delta: delta_seconds,
            at: Instant::now(),
        });
        let ok = self.seek_script.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(SeekResponse::success())
        } else {
            Ok(SeekResponse::failure(SeekFailureReason::SeekFailed))
        }
    }
}

/// Records start/stop requests instead of touching a device.
#[derive(Default)]
pub struct RecordingLink {
    pub starts: Mutex<Vec<Option<ConnectHint>>>,
    pub stops: AtomicUsize,
}

impl RecordingLink {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl DeviceLink for RecordingLink {
    fn start(&self, hint: Option<ConnectHint>) {
        self.starts.lock().unwrap().push(hint);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub browser: Arc<FakeBrowser>,
    pub link: Arc<RecordingLink>,
    pub started: Instant,
}

impl Harness {
    pub fn spawn(browser: Arc<FakeBrowser>) -> Self {
        let link = Arc::new(RecordingLink::default());
        let (handle, _task) = Coordinator::spawn(
            browser.clone(),
            link.clone(),
            &RepeatSettings::default(),
        );
        Self {
            handle,
            browser,
            link,
            started: Instant::now(),
        }
    }

    /// Let spawned seeks report back, then read the state.
    pub async fn settle(&self) -> StateSnapshot {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        self.handle.snapshot().await.unwrap()
    }

    /// Advance (paused) time to `ms` after the harness was created.
    pub async fn advance_to(&self, ms: u64) -> StateSnapshot {
        tokio::time::sleep_until(self.started + Duration::from_millis(ms)).await;
        self.settle().await
    }

    /// Seek offsets from the harness start, in milliseconds.
    pub fn seek_times(&self) -> Vec<u128> {
        self.browser
            .seeks()
            .iter()
            .map(|call| (call.at - self.started).as_millis())
            .collect()
    }
}
