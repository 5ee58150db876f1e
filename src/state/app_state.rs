use serde::{Deserialize, Serialize};

use crate::media::TabId;
use crate::state::device_status::DeviceStatus;

/// Seek direction repeated while a button is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeldAction {
    Rewind,
    Forward,
}

impl HeldAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeldAction::Rewind => "rewind",
            HeldAction::Forward => "forward",
        }
    }
}

/// Held-action state, owned and mutated only by the coordinator.
///
/// `held_action` and `held_target_tab_id` are set and cleared together, and
/// `repeat_fail_count` is zero whenever nothing is held. Every new sequence
/// and every reset bumps `generation`, which in-flight seeks carry so a late
/// answer can be matched against the sequence that issued it.
#[derive(Debug, Default)]
pub struct HeldState {
    held_action: Option<HeldAction>,
    held_target_tab_id: Option<TabId>,
    repeat_fail_count: u32,
    last_active_playing_tab_id: Option<TabId>,
    generation: u64,
}

impl HeldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_action(&self) -> Option<HeldAction> {
        self.held_action
    }

    pub fn held_target_tab_id(&self) -> Option<TabId> {
        self.held_target_tab_id
    }

    /// Action and target of the current sequence, read together.
    pub fn held(&self) -> Option<(HeldAction, TabId)> {
        match (self.held_action, self.held_target_tab_id) {
            (Some(action), Some(tab_id)) => Some((action, tab_id)),
            _ => None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held_action.is_some()
    }

    pub fn repeat_fail_count(&self) -> u32 {
        self.repeat_fail_count
    }

    pub fn last_active_playing_tab_id(&self) -> Option<TabId> {
        self.last_active_playing_tab_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Enter the held configuration for a freshly resolved target.
    pub fn begin(&mut self, action: HeldAction, target: TabId) {
        self.generation = self.generation.wrapping_add(1);
        self.held_action = Some(action);
        self.held_target_tab_id = Some(target);
        self.repeat_fail_count = 0;
        self.debug_check();
    }

    /// Change direction without touching the target or the fail count.
    pub fn switch_action(&mut self, action: HeldAction) {
        if self.held_target_tab_id.is_none() {
            log::warn!("[HOLD] switch to {:?} ignored: no held target", action);
            return;
        }
        self.held_action = Some(action);
        self.debug_check();
    }

    pub fn record_success(&mut self) {
        self.repeat_fail_count = 0;
    }

    /// Count a failed seek and return the new consecutive failure count.
    pub fn record_failure(&mut self) -> u32 {
        if !self.is_held() {
            return 0;
        }
        self.repeat_fail_count = self.repeat_fail_count.saturating_add(1);
        self.repeat_fail_count
    }

    /// Drop the held configuration. The remembered playing tab survives.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.held_action = None;
        self.held_target_tab_id = None;
        self.repeat_fail_count = 0;
        self.debug_check();
    }

    pub fn remember_playing_tab(&mut self, tab_id: TabId) {
        self.last_active_playing_tab_id = Some(tab_id);
    }

    /// Forget the remembered tab if it is `tab_id`. Returns whether it was.
    pub fn forget_playing_tab(&mut self, tab_id: TabId) -> bool {
        if self.last_active_playing_tab_id == Some(tab_id) {
            self.last_active_playing_tab_id = None;
            true
        } else {
            false
        }
    }

    fn debug_check(&self) {
        debug_assert_eq!(self.held_action.is_some(), self.held_target_tab_id.is_some());
        debug_assert!(self.held_action.is_some() || self.repeat_fail_count == 0);
    }
}

/// Read-only view handed to UI collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub last_active_playing_tab_id: Option<TabId>,
    pub held_action: Option<HeldAction>,
    pub held_target_tab_id: Option<TabId>,
    pub repeat_fail_count: u32,
    pub hid_status: DeviceStatus,
}

impl StateSnapshot {
    pub fn capture(held: &HeldState, hid_status: &DeviceStatus) -> Self {
        Self {
            last_active_playing_tab_id: held.last_active_playing_tab_id,
            held_action: held.held_action,
            held_target_tab_id: held.held_target_tab_id,
            repeat_fail_count: held.repeat_fail_count,
            hid_status: hid_status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_sets_action_and_target_together() {
        let mut state = HeldState::new();
        assert!(state.held().is_none());

        state.begin(HeldAction::Forward, 7);
        assert_eq!(state.held(), Some((HeldAction::Forward, 7)));
        assert_eq!(state.repeat_fail_count(), 0);
    }

    #[test]
    fn test_reset_clears_everything_but_memory() {
        let mut state = HeldState::new();
        state.remember_playing_tab(3);
        state.begin(HeldAction::Rewind, 7);
        state.record_failure();

        state.reset();
        assert!(state.held_action().is_none());
        assert!(state.held_target_tab_id().is_none());
        assert_eq!(state.repeat_fail_count(), 0);
        assert_eq!(state.last_active_playing_tab_id(), Some(3));
    }

    #[test]
    fn test_generation_bumps_on_begin_and_reset() {
        let mut state = HeldState::new();
        let g0 = state.generation();
        state.begin(HeldAction::Forward, 1);
        let g1 = state.generation();
        state.switch_action(HeldAction::Rewind);
        assert_eq!(state.generation(), g1);
        state.reset();
        assert!(g1 > g0);
        assert!(state.generation() > g1);
    }

    #[test]
    fn test_switch_keeps_target_and_fail_count() {
        let mut state = HeldState::new();
        state.begin(HeldAction::Forward, 9);
        state.record_failure();
        state.switch_action(HeldAction::Rewind);
        assert_eq!(state.held(), Some((HeldAction::Rewind, 9)));
        assert_eq!(state.repeat_fail_count(), 1);
    }

    #[test]
    fn test_failure_not_counted_when_idle() {
        let mut state = HeldState::new();
        assert_eq!(state.record_failure(), 0);
        assert_eq!(state.repeat_fail_count(), 0);
    }

    #[test]
    fn test_forget_playing_tab_only_matches_same_id() {
        let mut state = HeldState::new();
        state.remember_playing_tab(4);
        assert!(!state.forget_playing_tab(5));
        assert_eq!(state.last_active_playing_tab_id(), Some(4));
        assert!(state.forget_playing_tab(4));
        assert!(state.last_active_playing_tab_id().is_none());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut state = HeldState::new();
        state.begin(HeldAction::Rewind, 12);
        let snapshot = StateSnapshot::capture(&state, &DeviceStatus::default());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["heldAction"], "rewind");
        assert_eq!(json["heldTargetTabId"], 12);
        assert_eq!(json["repeatFailCount"], 0);
        assert_eq!(json["hidStatus"]["connected"], false);
    }
}
