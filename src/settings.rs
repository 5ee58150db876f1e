//! Persisted configuration: keyboard shortcuts, repeat timings, bridge and
//! device options. Stored as JSON; every field has a default so partial or
//! older files keep loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hid::ConnectHint;
use crate::input::Shortcut;
use crate::media::SEEK_STEP_SECONDS;

/// Overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "SWALLOW_SETTINGS";

const SETTINGS_DIR: &str = "swallow";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatSettings {
    pub seek_step_seconds: f64,
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    /// Consecutive failed seeks before the hold is abandoned.
    pub fail_threshold: u32,
}

impl Default for RepeatSettings {
    fn default() -> Self {
        Self {
            seek_step_seconds: SEEK_STEP_SECONDS,
            initial_delay_ms: 250,
            interval_ms: 100,
            fail_threshold: 2,
        }
    }
}

impl RepeatSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Zero would spin the interval timer, so it is clamped to 1 ms.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn fail_threshold(&self) -> u32 {
        self.fail_threshold.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub request_timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 1500,
        }
    }
}

impl BridgeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidSettings {
    /// Listen through hidapi in this process instead of the browser.
    pub native: bool,
    pub hint: Option<ConnectHint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rewind: Option<Shortcut>,
    pub forward: Option<Shortcut>,
    pub repeat: RepeatSettings,
    pub bridge: BridgeSettings,
    pub hid: HidSettings,
}

/// Settings file location: `$SWALLOW_SETTINGS`, else the platform config dir.
pub fn settings_path() -> Result<PathBuf, SettingsError> {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
        .ok_or(SettingsError::NoConfigDir)
}

impl Settings {
    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {:?}; using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Load from the default location, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = match settings_path() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Cannot locate settings: {}; using defaults", e);
                return Self::default();
            }
        };

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to load settings from {:?}: {}; using defaults", path, e);
                Self::default()
            }
        }
    }
}
