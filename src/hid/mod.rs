//! Input device plumbing.
//!
//! The coordinator never touches the device directly; it only asks a
//! [`DeviceLink`] to start or stop listening. The browser's WebHID listener is
//! reached through the bridge (`bridge::OffscreenLink`); with the `hid`
//! feature a native hidapi listener can be used instead.

#[cfg(feature = "hid")]
pub mod listener;

use serde::{Deserialize, Serialize};

#[cfg(feature = "hid")]
pub use listener::HidListener;

/// Which device the user picked, used to find it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectHint {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,
}

/// Minimal view of an attached device for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: Option<String>,
}

/// Pick a device: exact vendor/product match, else product name, else the first one.
pub fn choose_device<'a>(
    devices: &'a [DeviceDescriptor],
    hint: Option<&ConnectHint>,
) -> Option<&'a DeviceDescriptor> {
    let first = devices.first()?;

    let Some(hint) = hint else {
        return Some(first);
    };

    let found = match (hint.vendor_id, hint.product_id, hint.product_name.as_deref()) {
        (Some(vid), Some(pid), _) => devices
            .iter()
            .find(|d| d.vendor_id == vid && d.product_id == pid),
        (_, _, Some(name)) if !name.is_empty() => devices
            .iter()
            .find(|d| d.product_name.as_deref() == Some(name)),
        _ => None,
    };

    Some(found.unwrap_or(first))
}

/// Start/stop control over whatever is listening to the input device.
pub trait DeviceLink: Send + Sync {
    fn start(&self, hint: Option<ConnectHint>);
    fn stop(&self);
}
