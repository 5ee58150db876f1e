use std::collections::HashMap;
use std::str::FromStr;

use keyboard_types::Code;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::input::hotkeys::Shortcut;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcutParseError {
    #[error("shortcut is empty")]
    Empty,
    #[error("invalid key: {0}")]
    UnknownKey(String),
    #[error("shortcut has no key besides modifiers")]
    MissingKey,
    #[error("shortcut has more than one key: {0} and {1}")]
    MultipleKeys(String, String),
    #[error("modifier keys cannot be used on their own: {0}")]
    ModifierOnly(String),
}

/// Friendly names accepted in textual shortcuts, lowercased.
static KEY_ALIASES: Lazy<HashMap<&'static str, Code>> = Lazy::new(|| {
    HashMap::from([
        ("space", Code::Space),
        ("esc", Code::Escape),
        ("escape", Code::Escape),
        ("enter", Code::Enter),
        ("return", Code::Enter),
        ("tab", Code::Tab),
        ("backspace", Code::Backspace),
        ("del", Code::Delete),
        ("delete", Code::Delete),
        ("home", Code::Home),
        ("end", Code::End),
        ("pgup", Code::PageUp),
        ("pageup", Code::PageUp),
        ("pgdn", Code::PageDown),
        ("pagedown", Code::PageDown),
        ("left", Code::ArrowLeft),
        ("right", Code::ArrowRight),
        ("up", Code::ArrowUp),
        ("down", Code::ArrowDown),
        ("menu", Code::ContextMenu),
        (",", Code::Comma),
        (".", Code::Period),
        ("/", Code::Slash),
        (";", Code::Semicolon),
        ("[", Code::BracketLeft),
        ("]", Code::BracketRight),
    ])
});

enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

fn modifier_for(token: &str) -> Option<Modifier> {
    match token.to_lowercase().as_str() {
        "ctrl" | "control" => Some(Modifier::Ctrl),
        "shift" => Some(Modifier::Shift),
        "alt" | "option" => Some(Modifier::Alt),
        "meta" | "cmd" | "command" | "super" => Some(Modifier::Meta),
        _ => None,
    }
}

/// Resolve a DOM `code` string, a friendly alias, or a bare letter/digit.
pub fn code_from_str(token: &str) -> Option<Code> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(code) = KEY_ALIASES.get(token.to_lowercase().as_str()) {
        return Some(*code);
    }

    if let Ok(code) = Code::from_str(token) {
        if code != Code::Unidentified {
            return Some(code);
        }
    }

    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let candidate = if c.is_ascii_alphabetic() {
            format!("Key{}", c.to_ascii_uppercase())
        } else if c.is_ascii_digit() {
            format!("Digit{}", c)
        } else {
            return None;
        };
        return Code::from_str(&candidate).ok();
    }

    // Function keys written in lowercase ("f5")
    if token.len() <= 3 && token.starts_with(|c: char| c == 'f' || c == 'F') {
        return Code::from_str(&token.to_uppercase()).ok();
    }

    None
}

/// Codes that only make sense combined with another key.
pub fn is_modifier_only(code: Code) -> bool {
    let name = code.to_string();
    name.starts_with("Shift")
        || name.starts_with("Control")
        || name.starts_with("Alt")
        || name.starts_with("Meta")
}

/// Parse `"Ctrl+Shift+J"` style text into a shortcut.
pub fn parse_shortcut(text: &str) -> Result<Shortcut, ShortcutParseError> {
    if text.trim().is_empty() {
        return Err(ShortcutParseError::Empty);
    }

    let mut ctrl = false;
    let mut shift = false;
    let mut alt = false;
    let mut meta = false;
    let mut key: Option<(Code, String)> = None;

    for raw in text.split('+') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }

        if let Some(modifier) = modifier_for(token) {
            match modifier {
                Modifier::Ctrl => ctrl = true,
                Modifier::Shift => shift = true,
                Modifier::Alt => alt = true,
                Modifier::Meta => meta = true,
            }
            continue;
        }

        let code = code_from_str(token)
            .ok_or_else(|| ShortcutParseError::UnknownKey(token.to_string()))?;
        if is_modifier_only(code) {
            return Err(ShortcutParseError::ModifierOnly(token.to_string()));
        }
        if let Some((_, previous)) = &key {
            return Err(ShortcutParseError::MultipleKeys(
                previous.clone(),
                token.to_string(),
            ));
        }
        key = Some((code, token.to_string()));
    }

    let (code, _) = key.ok_or(ShortcutParseError::MissingKey)?;
    Ok(Shortcut {
        code,
        ctrl,
        shift,
        alt,
        meta,
    })
}

/// Short display name for a key code.
pub fn format_code(code: Code) -> String {
    let name = code.to_string();
    if code == Code::ContextMenu {
        return "Menu".to_string();
    }
    if let Some(letter) = name.strip_prefix("Key").filter(|rest| rest.len() == 1) {
        return letter.to_string();
    }
    if let Some(digit) = name.strip_prefix("Digit").filter(|rest| rest.len() == 1) {
        return digit.to_string();
    }
    name
}

/// Human-readable form, e.g. `Ctrl + Shift + J`. `-` when unset.
pub fn format_shortcut(shortcut: Option<&Shortcut>) -> String {
    let Some(s) = shortcut else {
        return "-".to_string();
    };

    let mut parts: Vec<String> = Vec::with_capacity(5);
    if s.ctrl {
        parts.push("Ctrl".to_string());
    }
    if s.shift {
        parts.push("Shift".to_string());
    }
    if s.alt {
        parts.push("Alt".to_string());
    }
    if s.meta {
        parts.push("Meta".to_string());
    }
    parts.push(format_code(s.code));
    parts.join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_modifiers() {
        let s = parse_shortcut("Ctrl+Shift+J").unwrap();
        assert_eq!(s.code, Code::KeyJ);
        assert!(s.ctrl && s.shift);
        assert!(!s.alt && !s.meta);
    }

    #[test]
    fn test_parse_accepts_dom_codes_and_aliases() {
        assert_eq!(parse_shortcut("ArrowLeft").unwrap().code, Code::ArrowLeft);
        assert_eq!(parse_shortcut("alt + left").unwrap().code, Code::ArrowLeft);
        assert_eq!(parse_shortcut("Cmd+5").unwrap().code, Code::Digit5);
        assert_eq!(parse_shortcut("f9").unwrap().code, Code::F9);
        assert!(parse_shortcut("Option+Space").unwrap().alt);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_shortcut("  "), Err(ShortcutParseError::Empty));
        assert_eq!(parse_shortcut("Ctrl+Shift"), Err(ShortcutParseError::MissingKey));
        assert!(matches!(
            parse_shortcut("Ctrl+J+K"),
            Err(ShortcutParseError::MultipleKeys(_, _))
        ));
        assert!(matches!(
            parse_shortcut("Ctrl+Wibble"),
            Err(ShortcutParseError::UnknownKey(_))
        ));
        assert!(matches!(
            parse_shortcut("ShiftLeft"),
            Err(ShortcutParseError::ModifierOnly(_))
        ));
    }

    #[test]
    fn test_format_code() {
        assert_eq!(format_code(Code::KeyJ), "J");
        assert_eq!(format_code(Code::Digit0), "0");
        assert_eq!(format_code(Code::ContextMenu), "Menu");
        assert_eq!(format_code(Code::ArrowRight), "ArrowRight");
    }

    #[test]
    fn test_format_shortcut() {
        assert_eq!(format_shortcut(None), "-");
        let s = parse_shortcut("Meta+Alt+Shift+Ctrl+K").unwrap();
        assert_eq!(format_shortcut(Some(&s)), "Ctrl + Shift + Alt + Meta + K");
    }
}
