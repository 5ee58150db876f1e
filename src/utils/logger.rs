//! Structured logging for the hold lifecycle.
//!
//! Everything goes to stderr: stdout carries the native-messaging frames, so
//! a stray line there would corrupt the stream the browser reads.
//!
//! `RUST_LOG` controls verbosity as usual; the default is `info` for this
//! crate and `warn` for everything else.

use std::fmt;
use std::io::Write;

use crate::media::TabId;
use crate::state::HeldAction;

/// Hold lifecycle milestones worth a line at info level.
#[derive(Debug, Clone)]
pub enum HoldEvent {
    Started {
        action: HeldAction,
        tab_id: TabId,
    },
    Reset {
        action: HeldAction,
        tab_id: TabId,
        reason: &'static str,
    },
    AutoReleased {
        tab_id: TabId,
        failures: u32,
    },
}

impl HoldEvent {
    fn level(&self) -> log::Level {
        match self {
            HoldEvent::AutoReleased { .. } => log::Level::Warn,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for HoldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldEvent::Started { action, tab_id } => {
                write!(f, "⏩ [HOLD] {} STARTED on tab {}", action.as_str(), tab_id)
            }
            HoldEvent::Reset {
                action,
                tab_id,
                reason,
            } => write!(
                f,
                "⏹️ [HOLD] {} on tab {} RESET ({})",
                action.as_str(),
                tab_id,
                reason
            ),
            HoldEvent::AutoReleased { tab_id, failures } => write!(
                f,
                "⚠️ [HOLD] Tab {} stopped responding after {} failed seeks; auto-releasing",
                tab_id, failures
            ),
        }
    }
}

pub fn log_event(event: HoldEvent) {
    log::log!(event.level(), "{}", event);
}

/// Install the stderr logger. Safe to call more than once.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn,swallow_lib=info,swallow=info");
    let result = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .try_init();

    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}
