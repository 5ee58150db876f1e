//! Event normalization: HID usage codes and keyboard events in, abstract
//! press/release signals out.

pub mod hotkeys;
pub mod key_normalizer;
pub mod usage;

pub use hotkeys::{KeyEvent, KeyPhase, KeyboardShortcuts, Shortcut};
pub use key_normalizer::{format_shortcut, parse_shortcut, ShortcutParseError};
pub use usage::{parse_usage_id, signal_for_usage};

use crate::state::HeldAction;

/// Normalized input signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Press(HeldAction),
    Release,
}
