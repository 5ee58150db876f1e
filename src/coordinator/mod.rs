//! Held-action coordinator.
//!
//! One task owns [`HeldState`] and the [`DeviceStatus`] register and handles
//! [`CoordinatorEvent`]s strictly one at a time. Seek round trips and timers
//! run on their own tasks and report back through the same channel, tagged so
//! that anything issued by an abandoned sequence is ignored on arrival.

pub mod events;
pub mod resolver;
pub mod scheduler;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::hid::{ConnectHint, DeviceLink};
use crate::input::{signal_for_usage, Signal};
use crate::media::{TabId, VideoController};
use crate::settings::RepeatSettings;
use crate::state::{DeviceStatus, DeviceStatusUpdate, HeldAction, HeldState, StateSnapshot};
use crate::state_machine::RepeatPhase;
use crate::utils::logger::{log_event, HoldEvent};

pub use events::CoordinatorEvent;
pub use resolver::TargetResolver;
pub use scheduler::{RepeatScheduler, SeekDispatcher};

pub struct Coordinator {
    held: HeldState,
    hid_status: DeviceStatus,
    resolver: TargetResolver,
    scheduler: RepeatScheduler,
    controller: Arc<dyn VideoController>,
    device: Arc<dyn DeviceLink>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    status_tx: watch::Sender<DeviceStatus>,
    fail_threshold: u32,
    /// Bumped on every tab activation or close; activation queries carry it.
    tab_epoch: u64,
}

/// Receiving half of [`channel`], consumed when the coordinator is built.
pub struct CoordinatorInbox {
    rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    status_tx: watch::Sender<DeviceStatus>,
}

impl CoordinatorInbox {
    /// Build the coordinator and run it on its own task.
    pub fn spawn(
        self,
        controller: Arc<dyn VideoController>,
        device: Arc<dyn DeviceLink>,
        repeat: &RepeatSettings,
    ) -> JoinHandle<()> {
        let (coordinator, rx) = Coordinator::new(controller, device, repeat, self);
        tokio::spawn(coordinator.run(rx))
    }

    /// Observe raw events without running a coordinator.
    #[cfg(test)]
    pub(crate) fn into_receiver(self) -> mpsc::UnboundedReceiver<CoordinatorEvent> {
        self.rx
    }
}

/// Create the event channel ahead of the coordinator, so device links and
/// the bridge can hold a handle before the coordinator exists.
pub fn channel() -> (CoordinatorHandle, CoordinatorInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(DeviceStatus::default());
    (
        CoordinatorHandle {
            tx: tx.clone(),
            status: status_rx,
        },
        CoordinatorInbox {
            rx,
            events: tx,
            status_tx,
        },
    )
}

impl Coordinator {
    pub fn new(
        controller: Arc<dyn VideoController>,
        device: Arc<dyn DeviceLink>,
        repeat: &RepeatSettings,
        inbox: CoordinatorInbox,
    ) -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let CoordinatorInbox {
            rx,
            events,
            status_tx,
        } = inbox;
        let dispatcher =
            SeekDispatcher::new(controller.clone(), events.clone(), repeat.seek_step_seconds);

        let coordinator = Self {
            held: HeldState::new(),
            hid_status: DeviceStatus::default(),
            resolver: TargetResolver::new(controller.clone()),
            scheduler: RepeatScheduler::new(repeat, dispatcher, events.clone()),
            controller,
            device,
            events,
            status_tx,
            fail_threshold: repeat.fail_threshold(),
            tab_epoch: 0,
        };
        (coordinator, rx)
    }

    /// Spawn the coordinator task and return a handle to it.
    pub fn spawn(
        controller: Arc<dyn VideoController>,
        device: Arc<dyn DeviceLink>,
        repeat: &RepeatSettings,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (handle, inbox) = channel();
        let task = inbox.spawn(controller, device, repeat);
        (handle, task)
    }

    /// Handle events until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        log::info!("[HOLD] Coordinator started");
        while let Some(event) = rx.recv().await {
            if !self.handle(event).await {
                break;
            }
        }
        self.scheduler.stop();
        log::info!("[HOLD] Coordinator stopped");
    }

    /// Process one event to completion. Returns `false` on shutdown.
    pub async fn handle(&mut self, event: CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::Press(action) => self.on_press(action).await,
            CoordinatorEvent::Release => self.on_release(),
            CoordinatorEvent::Usage(usage_id) => self.on_usage(usage_id).await,
            CoordinatorEvent::SeekCompleted {
                generation,
                tab_id,
                success,
            } => self.on_seek_result(generation, tab_id, success),
            CoordinatorEvent::RepeatDelayElapsed { epoch } => {
                self.scheduler.on_delay_elapsed(epoch)
            }
            CoordinatorEvent::RepeatTick { epoch } => self.on_repeat_tick(epoch),
            CoordinatorEvent::TabActivated(tab_id) => self.on_tab_activated(tab_id),
            CoordinatorEvent::PlayingTabObserved { tab_id, epoch } => {
                self.on_playing_tab_observed(tab_id, epoch)
            }
            CoordinatorEvent::TabClosed(tab_id) => self.on_tab_closed(tab_id),
            CoordinatorEvent::DeviceStatusChanged(update) => {
                self.on_device_status_changed(update)
            }
            CoordinatorEvent::ConnectGranted(hint) => self.on_connect_granted(hint),
            CoordinatorEvent::Disconnect => self.disconnect(),
            CoordinatorEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            CoordinatorEvent::Shutdown => return false,
        }
        true
    }

    pub async fn on_press(&mut self, action: HeldAction) {
        match self.held.held_action() {
            Some(current) if current == action => {
                log::trace!("[HOLD] Duplicate {:?} press ignored", action);
            }
            Some(current) => {
                let Some(target) = self.held.held_target_tab_id() else {
                    log::error!("[HOLD] {:?} held without a target; resetting", current);
                    self.reset("missing target");
                    return;
                };
                self.scheduler.stop();
                self.held.switch_action(action);
                log::info!("[HOLD] Switched {:?} -> {:?} on tab {}", current, action, target);
                self.scheduler.start(action, target, self.held.generation());
            }
            None => {
                let Some(target) = self
                    .resolver
                    .resolve_target(self.held.last_active_playing_tab_id())
                    .await
                else {
                    log::info!("[HOLD] {:?} press dropped: no target tab", action);
                    return;
                };
                self.held.begin(action, target);
                log_event(HoldEvent::Started {
                    action,
                    tab_id: target,
                });
                self.scheduler.start(action, target, self.held.generation());
            }
        }
    }

    pub fn on_release(&mut self) {
        self.reset("released");
    }

    /// Fold a seek outcome into the consecutive-failure policy. Results from
    /// an earlier sequence or another tab are dropped.
    pub fn on_seek_result(&mut self, generation: u64, tab_id: TabId, success: bool) {
        if generation != self.held.generation() || self.held.held_target_tab_id() != Some(tab_id) {
            log::trace!(
                "[HOLD] Stale seek result for tab {} (generation {})",
                tab_id,
                generation
            );
            return;
        }

        if success {
            self.held.record_success();
            return;
        }

        let failures = self.held.record_failure();
        log::debug!("[HOLD] Seek on tab {} failed ({} in a row)", tab_id, failures);
        if failures >= self.fail_threshold {
            log_event(HoldEvent::AutoReleased { tab_id, failures });
            self.reset("fail threshold");
        }
    }

    fn on_repeat_tick(&mut self, epoch: u64) {
        self.scheduler
            .on_tick(epoch, self.held.held(), self.held.generation());
    }

    pub fn on_tab_closed(&mut self, tab_id: TabId) {
        self.tab_epoch += 1;
        if self.held.forget_playing_tab(tab_id) {
            log::debug!("[HOLD] Forgot closed tab {}", tab_id);
        }
        if self.held.held_target_tab_id() == Some(tab_id) {
            self.reset("target tab closed");
        }
    }

    /// Best-effort: remember the tab if it turns out to be playing.
    pub fn on_tab_activated(&mut self, tab_id: TabId) {
        self.tab_epoch += 1;
        let epoch = self.tab_epoch;
        let controller = self.controller.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match controller.query_video_status(tab_id).await {
                Ok(status) if status.is_playing => {
                    let _ = events.send(CoordinatorEvent::PlayingTabObserved { tab_id, epoch });
                }
                Ok(_) => {}
                Err(e) => log::trace!("[HOLD] Status of activated tab {} unknown: {}", tab_id, e),
            }
        });
    }

    /// Apply an activation query result unless a later activation or a tab
    /// close has been handled since it was issued.
    pub fn on_playing_tab_observed(&mut self, tab_id: TabId, epoch: u64) {
        if epoch != self.tab_epoch {
            log::trace!("[HOLD] Stale playing observation for tab {}", tab_id);
            return;
        }
        self.held.remember_playing_tab(tab_id);
    }

    pub fn on_device_status_changed(&mut self, update: DeviceStatusUpdate) {
        self.hid_status.merge(update);
        if !self.hid_status.connected {
            self.reset("device disconnected");
        }
        self.publish_status();
    }

    /// Record the raw usage, then act on it.
    pub async fn on_usage(&mut self, usage_id: u32) {
        self.hid_status.record_usage(usage_id);
        match signal_for_usage(usage_id) {
            Some(Signal::Press(action)) => self.on_press(action).await,
            Some(Signal::Release) => self.on_release(),
            None => log::debug!("[HOLD] Ignoring usage 0x{:04X}", usage_id),
        }
    }

    pub fn on_connect_granted(&self, hint: Option<ConnectHint>) {
        log::info!("[HOLD] Device access granted; starting listener");
        self.device.start(hint);
    }

    /// Tear the device down and drop any held action.
    pub fn disconnect(&mut self) {
        log::info!("[HOLD] Disconnect requested");
        self.device.stop();
        self.reset("disconnect");
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.held, &self.hid_status)
    }

    #[cfg(test)]
    pub(crate) fn held_state(&self) -> &HeldState {
        &self.held
    }

    pub fn repeat_phase(&self) -> RepeatPhase {
        self.scheduler.phase()
    }

    fn reset(&mut self, reason: &'static str) {
        self.scheduler.stop();
        if let Some((action, tab_id)) = self.held.held() {
            log_event(HoldEvent::Reset {
                action,
                tab_id,
                reason,
            });
        }
        self.held.reset();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.hid_status.clone());
    }
}

/// Cloneable sender side of the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
    status: watch::Receiver<DeviceStatus>,
}

impl CoordinatorHandle {
    /// Queue an event. Returns `false` once the coordinator has stopped.
    pub fn send(&self, event: CoordinatorEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("[HOLD] Coordinator gone; dropped {:?}", e.0);
                false
            }
        }
    }

    pub fn press(&self, action: HeldAction) -> bool {
        self.send(CoordinatorEvent::Press(action))
    }

    pub fn release(&self) -> bool {
        self.send(CoordinatorEvent::Release)
    }

    pub fn signal(&self, signal: Signal) -> bool {
        match signal {
            Signal::Press(action) => self.press(action),
            Signal::Release => self.release(),
        }
    }

    pub fn usage(&self, usage_id: u32) -> bool {
        self.send(CoordinatorEvent::Usage(usage_id))
    }

    pub fn device_status(&self, update: DeviceStatusUpdate) -> bool {
        self.send(CoordinatorEvent::DeviceStatusChanged(update))
    }

    pub fn tab_activated(&self, tab_id: TabId) -> bool {
        self.send(CoordinatorEvent::TabActivated(tab_id))
    }

    pub fn tab_closed(&self, tab_id: TabId) -> bool {
        self.send(CoordinatorEvent::TabClosed(tab_id))
    }

    pub fn connect_granted(&self, hint: Option<ConnectHint>) -> bool {
        self.send(CoordinatorEvent::ConnectGranted(hint))
    }

    pub fn disconnect(&self) -> bool {
        self.send(CoordinatorEvent::Disconnect)
    }

    pub fn shutdown(&self) -> bool {
        self.send(CoordinatorEvent::Shutdown)
    }

    /// Current state as seen after every event queued before this call.
    pub async fn snapshot(&self) -> Option<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(CoordinatorEvent::Snapshot(reply)) {
            return None;
        }
        rx.await.ok()
    }

    /// Follow device status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<DeviceStatus> {
        self.status.clone()
    }
}
