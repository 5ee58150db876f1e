use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::messages::{ActiveTabResult, HostMessage};
use crate::hid::{ConnectHint, DeviceLink};
use crate::media::{ControllerError, SeekResponse, TabId, VideoController, VideoStatus};

type Reply = Result<Value, ControllerError>;

/// Host requests still waiting for their `RESPONSE` frame.
#[derive(Default)]
pub struct PendingRequests {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (u64, oneshot::Receiver<Reply>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    fn cancel(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Complete request `id`. Returns `false` if nobody is waiting for it
    /// (timed out already, or never issued).
    pub fn resolve(&self, id: u64, reply: Reply) -> bool {
        match self.lock().remove(&id) {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Fail every outstanding request, e.g. when the extension goes away.
    pub fn fail_all(&self, error: ControllerError) {
        let drained: Vec<_> = self.lock().drain().collect();
        if !drained.is_empty() {
            log::debug!("[BRIDGE] Failing {} pending requests: {}", drained.len(), error);
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        match self.waiting.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering from poisoned mutex in PendingRequests");
                poisoned.into_inner()
            }
        }
    }
}

/// [`VideoController`] that forwards every call to the extension and waits
/// for the correlated response.
pub struct BridgeVideoController {
    outgoing: mpsc::UnboundedSender<HostMessage>,
    pending: Arc<PendingRequests>,
    timeout: Duration,
}

impl BridgeVideoController {
    pub fn new(
        outgoing: mpsc::UnboundedSender<HostMessage>,
        pending: Arc<PendingRequests>,
        timeout: Duration,
    ) -> Self {
        Self {
            outgoing,
            pending,
            timeout,
        }
    }

    async fn request<T, F>(&self, build: F) -> Result<T, ControllerError>
    where
        T: DeserializeOwned,
        F: FnOnce(u64) -> HostMessage,
    {
        let (id, rx) = self.pending.register();
        if self.outgoing.send(build(id)).is_err() {
            self.pending.cancel(id);
            return Err(ControllerError::Disconnected);
        }

        let value = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply?,
            Ok(Err(_)) => return Err(ControllerError::Disconnected),
            Err(_) => {
                self.pending.cancel(id);
                log::debug!("[BRIDGE] Request {} timed out after {:?}", id, self.timeout);
                return Err(ControllerError::Timeout);
            }
        };

        serde_json::from_value(value)
            .map_err(|e| ControllerError::Transport(format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl VideoController for BridgeVideoController {
    async fn query_active_tab(&self) -> Result<Option<TabId>, ControllerError> {
        let result: ActiveTabResult = self
            .request(|id| HostMessage::QueryActiveTab { id })
            .await?;
        Ok(result.tab_id)
    }

    async fn query_video_status(&self, tab_id: TabId) -> Result<VideoStatus, ControllerError> {
        self.request(|id| HostMessage::QueryStatus { id, tab_id })
            .await
    }

    async fn send_seek(
        &self,
        tab_id: TabId,
        delta_seconds: f64,
    ) -> Result<SeekResponse, ControllerError> {
        self.request(|id| HostMessage::Seek {
            id,
            tab_id,
            delta_seconds,
        })
        .await
    }
}

/// Device link for the extension's WebHID listener (offscreen document).
pub struct OffscreenLink {
    outgoing: mpsc::UnboundedSender<HostMessage>,
}

impl OffscreenLink {
    pub fn new(outgoing: mpsc::UnboundedSender<HostMessage>) -> Self {
        Self { outgoing }
    }
}

impl DeviceLink for OffscreenLink {
    fn start(&self, hint: Option<ConnectHint>) {
        if self.outgoing.send(HostMessage::OffscreenStart { hint }).is_err() {
            log::warn!("[BRIDGE] Cannot start offscreen listener: bridge closed");
        }
    }

    fn stop(&self) {
        if self.outgoing.send(HostMessage::OffscreenStop).is_err() {
            log::warn!("[BRIDGE] Cannot stop offscreen listener: bridge closed");
        }
    }
}
