use serde::{Deserialize, Deserializer, Serialize};

/// Last known status of the input device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub connected: bool,
    pub listening: bool,
    pub product_name: Option<String>,
    pub last_usage_id: Option<u32>,
}

/// Partial status report. Only the fields that are present overwrite.
///
/// `product_name` and `last_usage_id` keep "absent" (`None`) apart from an
/// explicit `null` (`Some(None)`), which clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_name: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_usage_id: Option<Option<u32>>,
}

fn present_field<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl DeviceStatusUpdate {
    /// Full "nothing attached" report sent when a listener stops.
    pub fn disconnected() -> Self {
        Self {
            connected: Some(false),
            listening: Some(false),
            product_name: Some(None),
            last_usage_id: Some(None),
        }
    }

    pub fn listening_on(product_name: impl Into<String>) -> Self {
        Self {
            connected: Some(true),
            listening: Some(true),
            product_name: Some(Some(product_name.into())),
            last_usage_id: Some(None),
        }
    }
}

impl DeviceStatus {
    /// Merge a partial report into the register.
    pub fn merge(&mut self, update: DeviceStatusUpdate) {
        if let Some(connected) = update.connected {
            self.connected = connected;
        }
        if let Some(listening) = update.listening {
            self.listening = listening;
        }
        if let Some(product_name) = update.product_name {
            self.product_name = product_name;
        }
        if let Some(last_usage_id) = update.last_usage_id {
            self.last_usage_id = last_usage_id;
        }
    }

    pub fn record_usage(&mut self, usage_id: u32) {
        self.last_usage_id = Some(usage_id);
    }
}
