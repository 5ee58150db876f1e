use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::{BridgeVideoController, OffscreenLink, PendingRequests};
use super::codec::{decode_message, read_frame, write_message};
use super::error::BridgeError;
use super::messages::{ExtensionMessage, HostMessage};
use crate::coordinator::{self, CoordinatorHandle};
use crate::hid::{ConnectHint, DeviceLink};
use crate::input::{format_shortcut, KeyboardShortcuts};
use crate::media::ControllerError;
use crate::settings::Settings;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Routes decoded extension frames to the coordinator and the pending
/// request table. Owns the keyboard matcher and the live settings.
pub struct MessageRouter {
    handle: CoordinatorHandle,
    pending: Arc<PendingRequests>,
    outgoing: mpsc::UnboundedSender<HostMessage>,
    shortcuts: KeyboardShortcuts,
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl MessageRouter {
    pub fn new(
        handle: CoordinatorHandle,
        pending: Arc<PendingRequests>,
        outgoing: mpsc::UnboundedSender<HostMessage>,
        settings: Settings,
        settings_path: Option<PathBuf>,
    ) -> Self {
        let shortcuts = KeyboardShortcuts::new(settings.rewind.clone(), settings.forward.clone());
        Self {
            handle,
            pending,
            outgoing,
            shortcuts,
            settings,
            settings_path,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn route(&mut self, message: ExtensionMessage) {
        match message {
            ExtensionMessage::HidUsage { usage_id } => {
                self.handle.usage(usage_id);
            }
            ExtensionMessage::KbPress { action } => {
                self.handle.press(action);
            }
            ExtensionMessage::KbRelease => {
                self.handle.release();
            }
            ExtensionMessage::KeyEvent(event) => {
                if let Some(signal) = self.shortcuts.handle(&event) {
                    log::debug!("[BRIDGE] Shortcut {:?} -> {:?}", event.code, signal);
                    self.handle.signal(signal);
                }
            }
            ExtensionMessage::OffscreenStatus { status } => {
                self.handle.device_status(status);
            }
            ExtensionMessage::ConnectGranted { hint } => {
                self.remember_hint(hint.as_ref());
                self.handle.connect_granted(hint);
            }
            ExtensionMessage::TabActivated { tab_id } => {
                self.handle.tab_activated(tab_id);
            }
            ExtensionMessage::TabRemoved { tab_id } => {
                self.handle.tab_closed(tab_id);
            }
            ExtensionMessage::SetShortcuts { rewind, forward } => {
                log::info!(
                    "[BRIDGE] Shortcuts set: rewind {}, forward {}",
                    format_shortcut(rewind.as_ref()),
                    format_shortcut(forward.as_ref())
                );
                self.shortcuts.update(rewind.clone(), forward.clone());
                self.settings.rewind = rewind;
                self.settings.forward = forward;
                self.persist();
            }
            ExtensionMessage::PopupGetState => self.reply_state(),
            ExtensionMessage::PopupDisconnect => {
                self.handle.disconnect();
            }
            ExtensionMessage::Response { id, result, error } => {
                let reply = match error {
                    Some(message) => Err(ControllerError::Transport(message)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                if !self.pending.resolve(id, reply) {
                    log::debug!("[BRIDGE] Late or unknown response {}", id);
                }
            }
        }
    }

    /// The snapshot waits on the coordinator, which may itself be waiting on
    /// a response this router has yet to read, so it runs on its own task.
    fn reply_state(&self) {
        let handle = self.handle.clone();
        let outgoing = self.outgoing.clone();
        tokio::spawn(async move {
            if let Some(state) = handle.snapshot().await {
                let _ = outgoing.send(HostMessage::State { state });
            }
        });
    }

    fn remember_hint(&mut self, hint: Option<&ConnectHint>) {
        let Some(hint) = hint else {
            return;
        };
        if self.settings.hid.hint.as_ref() == Some(hint) {
            return;
        }
        self.settings.hid.hint = Some(hint.clone());
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        match self.settings.save_to(path) {
            Ok(()) => log::debug!("[BRIDGE] Settings saved to {:?}", path),
            Err(e) => log::warn!("[BRIDGE] Failed to save settings to {:?}: {}", path, e),
        }
    }
}

/// Pick the device link. Returns whether it is the in-process listener.
#[cfg_attr(not(feature = "hid"), allow(unused_variables))]
fn device_link(
    settings: &Settings,
    handle: &CoordinatorHandle,
    outgoing: &mpsc::UnboundedSender<HostMessage>,
) -> (Arc<dyn DeviceLink>, bool) {
    if settings.hid.native {
        #[cfg(feature = "hid")]
        {
            log::info!("[BRIDGE] Using native HID listener");
            let listener: Arc<dyn DeviceLink> =
                Arc::new(crate::hid::HidListener::new(handle.clone()));
            return (listener, true);
        }
        #[cfg(not(feature = "hid"))]
        log::warn!("[BRIDGE] Native HID requested but built without the `hid` feature");
    }
    let offscreen: Arc<dyn DeviceLink> = Arc::new(OffscreenLink::new(outgoing.clone()));
    (offscreen, false)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<HostMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        match write_message(&mut writer, &message).await {
            Ok(()) => {}
            Err(e @ BridgeError::FrameTooLarge { .. }) => {
                log::warn!("[BRIDGE] Dropping outgoing message: {}", e);
            }
            Err(e) => {
                log::error!("[BRIDGE] Write failed, closing writer: {}", e);
                break;
            }
        }
    }
}

fn forward_status(
    handle: &CoordinatorHandle,
    outgoing: mpsc::UnboundedSender<HostMessage>,
) -> JoinHandle<()> {
    let mut status = handle.subscribe_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let hid_status = status.borrow_and_update().clone();
            if outgoing
                .send(HostMessage::HidStatusChanged { hid_status })
                .is_err()
            {
                break;
            }
        }
    })
}

/// Run the native host over `reader`/`writer` until the extension closes
/// the stream. Normally these are stdin and stdout.
pub async fn serve<R, W>(
    mut reader: R,
    writer: W,
    settings: Settings,
    settings_path: Option<PathBuf>,
) -> Result<(), BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let pending = Arc::new(PendingRequests::new());
    let controller = Arc::new(BridgeVideoController::new(
        outgoing.clone(),
        pending.clone(),
        settings.bridge.request_timeout(),
    ));

    let (handle, inbox) = coordinator::channel();
    let (device, native) = device_link(&settings, &handle, &outgoing);
    let coordinator_task = inbox.spawn(controller, device.clone(), &settings.repeat);
    let writer_task = tokio::spawn(write_loop(writer, outgoing_rx));
    let status_task = forward_status(&handle, outgoing.clone());

    if native {
        handle.connect_granted(settings.hid.hint.clone());
    }

    let mut router = MessageRouter::new(
        handle.clone(),
        pending.clone(),
        outgoing.clone(),
        settings,
        settings_path,
    );

    log::info!("[BRIDGE] Native host ready");
    let result = loop {
        let payload = match read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                log::info!("[BRIDGE] Extension closed the stream");
                break Ok(());
            }
            Err(e) => {
                log::error!("[BRIDGE] Read failed: {}", e);
                break Err(e);
            }
        };

        match decode_message::<ExtensionMessage>(&payload) {
            Ok(message) => router.route(message),
            Err(e) => log::warn!("[BRIDGE] Ignoring undecodable message: {}", e),
        }
    };

    pending.fail_all(ControllerError::Disconnected);
    if native {
        device.stop();
    }
    handle.shutdown();
    if let Err(e) = coordinator_task.await {
        log::error!("[BRIDGE] Coordinator task failed: {}", e);
    }
    pending.fail_all(ControllerError::Disconnected);
    status_task.abort();

    drop(router);
    drop(device);
    drop(outgoing);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_task)
        .await
        .is_err()
    {
        log::warn!("[BRIDGE] Writer did not drain in time");
    }

    result
}
