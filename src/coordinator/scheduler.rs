//! Repeat scheduler.
//!
//! Turns one press into an immediate seek, a start delay, then a steady
//! interval of seeks. A single timer slot holds either the delay task or the
//! interval task, never both. Every arm bumps `epoch`; timer events carry the
//! epoch they were armed under so anything queued before a `stop()` is
//! recognised as stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::coordinator::events::CoordinatorEvent;
use crate::media::{seek_delta, seek_succeeded, TabId, VideoController};
use crate::settings::RepeatSettings;
use crate::state::HeldAction;
use crate::state_machine::{RepeatPhase, RepeatStateMachine};

/// Spawns seek round trips and reports their outcome back to the coordinator.
#[derive(Clone)]
pub struct SeekDispatcher {
    controller: Arc<dyn VideoController>,
    events: UnboundedSender<CoordinatorEvent>,
    step_seconds: f64,
}

impl SeekDispatcher {
    pub fn new(
        controller: Arc<dyn VideoController>,
        events: UnboundedSender<CoordinatorEvent>,
        step_seconds: f64,
    ) -> Self {
        Self {
            controller,
            events,
            step_seconds,
        }
    }

    /// Fire one seek for `action` at `tab_id`. The result always comes back
    /// as [`CoordinatorEvent::SeekCompleted`] tagged with `generation`.
    pub fn dispatch(&self, generation: u64, tab_id: TabId, action: HeldAction) {
        let controller = self.controller.clone();
        let events = self.events.clone();
        let delta = seek_delta(action, self.step_seconds);

        tokio::spawn(async move {
            let result = controller.send_seek(tab_id, delta).await;
            match &result {
                Ok(response) if !response.ok => {
                    log::debug!(
                        "[REPEAT] Tab {} refused seek {:+}: {:?}",
                        tab_id,
                        delta,
                        response.reason
                    );
                }
                Err(e) => log::debug!("[REPEAT] Seek {:+} on tab {} failed: {}", delta, tab_id, e),
                _ => {}
            }

            let completed = CoordinatorEvent::SeekCompleted {
                generation,
                tab_id,
                success: seek_succeeded(&result),
            };
            if events.send(completed).is_err() {
                log::trace!("[REPEAT] Coordinator gone; dropping seek result");
            }
        });
    }
}

pub struct RepeatScheduler {
    machine: RepeatStateMachine,
    timer: Option<JoinHandle<()>>,
    epoch: u64,
    initial_delay: Duration,
    interval: Duration,
    dispatcher: SeekDispatcher,
    events: UnboundedSender<CoordinatorEvent>,
}

impl RepeatScheduler {
    pub fn new(
        settings: &RepeatSettings,
        dispatcher: SeekDispatcher,
        events: UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        Self {
            machine: RepeatStateMachine::new(),
            timer: None,
            epoch: 0,
            initial_delay: settings.initial_delay(),
            interval: settings.interval(),
            dispatcher,
            events,
        }
    }

    pub fn phase(&self) -> RepeatPhase {
        self.machine.current()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Cancel whatever is armed, seek once right away, then arm the start delay.
    pub fn start(&mut self, action: HeldAction, target: TabId, generation: u64) {
        self.cancel_timer();
        self.dispatcher.dispatch(generation, target, action);

        if let Err(e) = self.machine.transition_to(RepeatPhase::PendingStart) {
            log::error!("[REPEAT] {}", e);
            self.machine.reset();
            return;
        }

        let epoch = self.epoch;
        let delay = self.initial_delay;
        let events = self.events.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(CoordinatorEvent::RepeatDelayElapsed { epoch });
        }));

        log::debug!(
            "[REPEAT] Started {:?} on tab {} (epoch {}, delay {:?})",
            action,
            target,
            epoch,
            delay
        );
    }

    /// Cancel both timer kinds. Safe to call in any phase.
    pub fn stop(&mut self) {
        self.cancel_timer();
        self.machine.reset();
    }

    /// The start delay ran out: switch the slot over to the interval timer.
    pub fn on_delay_elapsed(&mut self, epoch: u64) {
        if epoch != self.epoch || self.machine.current() != RepeatPhase::PendingStart {
            log::trace!("[REPEAT] Ignoring stale start delay (epoch {})", epoch);
            return;
        }

        if let Err(e) = self.machine.transition_to(RepeatPhase::Repeating) {
            log::error!("[REPEAT] {}", e);
            self.stop();
            return;
        }

        // The delay task has finished; its handle is replaced, not aborted.
        self.timer.take();

        let period = self.interval;
        let events = self.events.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(CoordinatorEvent::RepeatTick { epoch }).is_err() {
                    break;
                }
            }
        }));
    }

    /// One interval tick. `held` is read from the coordinator at fire time;
    /// if the hold is gone the scheduler stops itself.
    pub fn on_tick(&mut self, epoch: u64, held: Option<(HeldAction, TabId)>, generation: u64) {
        if epoch != self.epoch || self.machine.current() != RepeatPhase::Repeating {
            log::trace!("[REPEAT] Ignoring stale tick (epoch {})", epoch);
            return;
        }

        match held {
            Some((action, tab_id)) => self.dispatcher.dispatch(generation, tab_id, action),
            None => {
                log::debug!("[REPEAT] Tick with nothing held; stopping");
                self.stop();
            }
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
    }
}

impl Drop for RepeatScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}
