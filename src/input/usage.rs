use crate::input::Signal;
use crate::state::HeldAction;

/// Usage code reported when every button is up.
pub const USAGE_RELEASE: u32 = 0x0000;
/// Consumer page "Scan Next Track".
pub const USAGE_FORWARD: u32 = 0x00B3;
/// Consumer page "Scan Previous Track".
pub const USAGE_REWIND: u32 = 0x00B4;

/// Usage id carried by an input report: little-endian u16 when at least two
/// bytes are present, the single byte otherwise, 0 for an empty report.
pub fn parse_usage_id(report: &[u8]) -> u32 {
    match report {
        [lo, hi, ..] => u32::from(u16::from_le_bytes([*lo, *hi])),
        [only] => u32::from(*only),
        [] => USAGE_RELEASE,
    }
}

/// Map a usage code to a press/release signal. Unknown codes map to nothing.
pub fn signal_for_usage(usage_id: u32) -> Option<Signal> {
    match usage_id {
        USAGE_RELEASE => Some(Signal::Release),
        USAGE_FORWARD => Some(Signal::Press(HeldAction::Forward)),
        USAGE_REWIND => Some(Signal::Press(HeldAction::Rewind)),
        _ => None,
    }
}
