use tokio::sync::oneshot;

use crate::hid::ConnectHint;
use crate::media::TabId;
use crate::state::{DeviceStatusUpdate, HeldAction, StateSnapshot};

/// Everything the coordinator task reacts to, in arrival order.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// Normalized button-down for an action.
    Press(HeldAction),
    /// Normalized button-up.
    Release,
    /// Raw HID usage code, normalized by the coordinator after recording it.
    Usage(u32),
    /// A seek round trip finished.
    SeekCompleted {
        generation: u64,
        tab_id: TabId,
        success: bool,
    },
    /// The start delay armed under `epoch` elapsed.
    RepeatDelayElapsed { epoch: u64 },
    /// The interval armed under `epoch` ticked.
    RepeatTick { epoch: u64 },
    TabActivated(TabId),
    /// A best-effort status query, issued under tab `epoch`, found video
    /// playing on this tab.
    PlayingTabObserved { tab_id: TabId, epoch: u64 },
    TabClosed(TabId),
    DeviceStatusChanged(DeviceStatusUpdate),
    ConnectGranted(Option<ConnectHint>),
    /// Tear the device down and drop any held action.
    Disconnect,
    Snapshot(oneshot::Sender<StateSnapshot>),
    Shutdown,
}
