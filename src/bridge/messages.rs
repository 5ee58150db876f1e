use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hid::ConnectHint;
use crate::input::{KeyEvent, Shortcut};
use crate::media::TabId;
use crate::state::{DeviceStatus, DeviceStatusUpdate, HeldAction, StateSnapshot};

/// Frames sent by the extension.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    #[serde(rename_all = "camelCase")]
    HidUsage { usage_id: u32 },
    KbPress { action: HeldAction },
    KbRelease,
    /// Raw key event; matched against the configured shortcuts here.
    KeyEvent(KeyEvent),
    OffscreenStatus { status: DeviceStatusUpdate },
    ConnectGranted {
        #[serde(default)]
        hint: Option<ConnectHint>,
    },
    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    SetShortcuts {
        #[serde(default)]
        rewind: Option<Shortcut>,
        #[serde(default)]
        forward: Option<Shortcut>,
    },
    PopupGetState,
    PopupDisconnect,
    /// Answer to a host request with the same `id`.
    Response {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Frames sent to the extension.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    QueryActiveTab {
        id: u64,
    },
    #[serde(rename_all = "camelCase")]
    QueryStatus { id: u64, tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    Seek {
        id: u64,
        tab_id: TabId,
        delta_seconds: f64,
    },
    OffscreenStart {
        hint: Option<ConnectHint>,
    },
    OffscreenStop,
    #[serde(rename_all = "camelCase")]
    HidStatusChanged { hid_status: DeviceStatus },
    State { state: StateSnapshot },
}

/// `result` payload of a `QUERY_ACTIVE_TAB` response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTabResult {
    #[serde(default)]
    pub tab_id: Option<TabId>,
}
