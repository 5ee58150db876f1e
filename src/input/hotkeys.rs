use keyboard_types::Code;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::input::key_normalizer::{code_from_str, parse_shortcut};
use crate::input::Signal;
use crate::state::HeldAction;

/// A key plus the exact modifier set that must accompany it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub code: Code,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Shortcut {
    pub fn new(code: Code) -> Self {
        Self {
            code,
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    /// Exact match: same code, same modifiers, no extras.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.code == self.code
            && event.ctrl == self.ctrl
            && event.shift == self.shift
            && event.alt == self.alt
            && event.meta == self.meta
    }
}

#[derive(Serialize, Deserialize)]
struct ShortcutFields {
    code: String,
    #[serde(default)]
    ctrl: bool,
    #[serde(default)]
    shift: bool,
    #[serde(default)]
    alt: bool,
    #[serde(default)]
    meta: bool,
}

/// Stored either as `{"code": "KeyJ", "ctrl": true, ...}` or as `"Ctrl+J"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ShortcutRepr {
    Text(String),
    Fields(ShortcutFields),
}

impl Serialize for Shortcut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ShortcutFields {
            code: self.code.to_string(),
            ctrl: self.ctrl,
            shift: self.shift,
            alt: self.alt,
            meta: self.meta,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Shortcut {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ShortcutRepr::deserialize(deserializer)? {
            ShortcutRepr::Text(text) => parse_shortcut(&text).map_err(serde::de::Error::custom),
            ShortcutRepr::Fields(fields) => {
                let code = code_from_str(&fields.code).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown key code: {}", fields.code))
                })?;
                Ok(Shortcut {
                    code,
                    ctrl: fields.ctrl,
                    shift: fields.shift,
                    alt: fields.alt,
                    meta: fields.meta,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    Down,
    Up,
}

/// Keyboard event forwarded from the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyEvent {
    pub phase: KeyPhase,
    #[serde(deserialize_with = "lenient_code")]
    pub code: Code,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
    /// Auto-repeat keydown from the OS.
    #[serde(default)]
    pub repeat: bool,
    /// Focus was in a text field or other editable element.
    #[serde(default)]
    pub editable: bool,
}

fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Code, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(code_from_str(&raw).unwrap_or(Code::Unidentified))
}

impl KeyEvent {
    pub fn down(code: Code) -> Self {
        Self {
            phase: KeyPhase::Down,
            code,
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            repeat: false,
            editable: false,
        }
    }

    pub fn up(code: Code) -> Self {
        Self {
            phase: KeyPhase::Up,
            ..Self::down(code)
        }
    }

    pub fn with_modifiers(mut self, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Self {
        self.ctrl = ctrl;
        self.shift = shift;
        self.alt = alt;
        self.meta = meta;
        self
    }
}

/// Matches key events against the configured rewind/forward shortcuts.
///
/// A keyup only releases when the hold was started from the keyboard, so a
/// stray keyup cannot cancel a pedal hold.
#[derive(Debug, Default)]
pub struct KeyboardShortcuts {
    rewind: Option<Shortcut>,
    forward: Option<Shortcut>,
    held_by_keyboard: bool,
}

impl KeyboardShortcuts {
    pub fn new(rewind: Option<Shortcut>, forward: Option<Shortcut>) -> Self {
        Self {
            rewind,
            forward,
            held_by_keyboard: false,
        }
    }

    pub fn update(&mut self, rewind: Option<Shortcut>, forward: Option<Shortcut>) {
        self.rewind = rewind;
        self.forward = forward;
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.held_by_keyboard
    }

    fn matched_action(&self, event: &KeyEvent) -> Option<HeldAction> {
        let matches = |s: &Option<Shortcut>| s.as_ref().is_some_and(|s| s.matches(event));
        if matches(&self.rewind) {
            Some(HeldAction::Rewind)
        } else if matches(&self.forward) {
            Some(HeldAction::Forward)
        } else {
            None
        }
    }

    pub fn handle(&mut self, event: &KeyEvent) -> Option<Signal> {
        match event.phase {
            KeyPhase::Down => {
                if event.repeat || event.editable {
                    return None;
                }
                let action = self.matched_action(event)?;
                self.held_by_keyboard = true;
                log::debug!("Keyboard shortcut pressed: {:?}", action);
                Some(Signal::Press(action))
            }
            KeyPhase::Up => {
                if !self.held_by_keyboard || self.matched_action(event).is_none() {
                    return None;
                }
                self.held_by_keyboard = false;
                log::debug!("Keyboard shortcut released");
                Some(Signal::Release)
            }
        }
    }
}
