//! End-to-end hold behaviour against a scripted browser, on paused time.

use std::sync::Arc;

use super::support::{FakeBrowser, Harness, PAUSED, PLAYING};
use crate::coordinator::{self, Coordinator, CoordinatorEvent};
use crate::hid::ConnectHint;
use crate::settings::RepeatSettings;
use crate::state::{DeviceStatusUpdate, HeldAction};
use crate::state_machine::RepeatPhase;

#[tokio::test(start_paused = true)]
async fn test_press_seeks_once_then_repeats_on_interval() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Forward);
    let state = h.advance_to(249).await;
    assert_eq!(state.held_action, Some(HeldAction::Forward));
    assert_eq!(state.held_target_tab_id, Some(5));
    assert_eq!(h.seek_times(), vec![0]);

    h.advance_to(560).await;
    assert_eq!(h.seek_times(), vec![0, 350, 450, 550]);
    assert!(h
        .browser
        .seeks()
        .iter()
        .all(|call| call.tab_id == 5 && call.delta == 10.0));
}

#[tokio::test(start_paused = true)]
async fn test_release_stops_repeating() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Rewind);
    h.advance_to(400).await;
    h.handle.release();
    let state = h.settle().await;

    assert_eq!(state.held_action, None);
    assert_eq!(state.held_target_tab_id, None);
    assert_eq!(state.repeat_fail_count, 0);

    let seen = h.browser.seek_count();
    h.advance_to(2_000).await;
    assert_eq!(h.browser.seek_count(), seen);
    assert!(h.browser.seeks().iter().all(|call| call.delta == -10.0));
}

#[tokio::test(start_paused = true)]
async fn test_release_during_start_delay_never_repeats() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Forward);
    h.advance_to(100).await;
    h.handle.release();
    h.advance_to(1_000).await;

    assert_eq!(h.seek_times(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_press_is_ignored() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Forward);
    h.settle().await;
    h.handle.press(HeldAction::Forward);
    h.handle.press(HeldAction::Forward);
    let state = h.advance_to(200).await;

    assert_eq!(h.browser.seek_count(), 1);
    assert_eq!(state.held_action, Some(HeldAction::Forward));
}

#[tokio::test(start_paused = true)]
async fn test_switch_keeps_target_and_restarts_timing() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    h.advance_to(300).await;

    // The active tab changes, but the hold stays on its original target.
    browser.with_active(8, PLAYING);
    h.handle.press(HeldAction::Rewind);
    let state = h.advance_to(500).await;

    assert_eq!(state.held_action, Some(HeldAction::Rewind));
    assert_eq!(state.held_target_tab_id, Some(5));

    let seeks = browser.seeks();
    assert_eq!(seeks.len(), 2);
    assert_eq!((seeks[0].tab_id, seeks[0].delta), (5, 10.0));
    assert_eq!((seeks[1].tab_id, seeks[1].delta), (5, -10.0));

    h.advance_to(660).await;
    assert_eq!(h.seek_times(), vec![0, 300, 650]);
}

#[tokio::test(start_paused = true)]
async fn test_two_consecutive_failures_auto_release() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    browser.script_seeks(&[true, true, false, false]);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    let state = h.advance_to(500).await;
    assert_eq!(state.held_action, Some(HeldAction::Forward));
    assert_eq!(state.repeat_fail_count, 1);

    let state = h.advance_to(560).await;
    assert_eq!(state.held_action, None);
    assert_eq!(state.repeat_fail_count, 0);

    h.advance_to(1_500).await;
    assert_eq!(browser.seek_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_success_between_failures_resets_count() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    browser.script_seeks(&[false, true, false, false]);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    let state = h.advance_to(460).await;
    assert_eq!(state.held_action, Some(HeldAction::Forward));
    assert_eq!(state.repeat_fail_count, 1);

    let state = h.advance_to(560).await;
    assert_eq!(state.held_action, None);
    assert_eq!(browser.seek_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_seek_still_repeats() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    browser.script_seeks(&[false]);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    let state = h.advance_to(200).await;
    assert_eq!(state.repeat_fail_count, 1);

    let state = h.advance_to(360).await;
    assert_eq!(h.seek_times(), vec![0, 350]);
    assert_eq!(state.repeat_fail_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_count_survives_direction_switch() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    browser.script_seeks(&[false, false]);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    h.advance_to(100).await;
    h.handle.press(HeldAction::Rewind);
    let state = h.settle().await;

    assert_eq!(state.held_action, None);
    assert_eq!(browser.seek_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_closing_target_tab_releases() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Forward);
    h.advance_to(400).await;
    h.handle.tab_closed(5);
    let state = h.settle().await;
    assert_eq!(state.held_action, None);

    let seen = browser.seek_count();
    h.advance_to(1_000).await;
    assert_eq!(browser.seek_count(), seen);
}

#[tokio::test(start_paused = true)]
async fn test_closing_other_tab_keeps_hold() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Forward);
    h.settle().await;
    h.handle.tab_closed(9);
    let state = h.settle().await;

    assert_eq!(state.held_action, Some(HeldAction::Forward));
}

#[tokio::test(start_paused = true)]
async fn test_press_without_target_is_dropped() {
    let browser = FakeBrowser::new();
    let h = Harness::spawn(browser.clone());

    h.handle.press(HeldAction::Rewind);
    let state = h.advance_to(1_000).await;

    assert_eq!(state.held_action, None);
    assert_eq!(browser.seek_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remembered_playing_tab_beats_idle_active_tab() {
    let browser = FakeBrowser::new().with_active(3, PLAYING);
    let h = Harness::spawn(browser.clone());

    h.handle.tab_activated(3);
    let state = h.settle().await;
    assert_eq!(state.last_active_playing_tab_id, Some(3));

    // User switches to a paused video; the playing one is still the target.
    browser.with_active(9, PAUSED);
    h.handle.press(HeldAction::Forward);
    let state = h.settle().await;

    assert_eq!(state.held_target_tab_id, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_activated_idle_tab_is_not_remembered() {
    let h = Harness::spawn(FakeBrowser::new().with_active(4, PAUSED));

    h.handle.tab_activated(4);
    let state = h.settle().await;

    assert_eq!(state.last_active_playing_tab_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_closing_tab_during_activation_query_forgets_it() {
    let h = Harness::spawn(FakeBrowser::new().with_active(3, PLAYING));

    h.handle.tab_activated(3);
    h.handle.tab_closed(3);
    let state = h.settle().await;
    assert_eq!(state.last_active_playing_tab_id, None);

    // A fresh activation is still honored.
    h.handle.tab_activated(3);
    let state = h.settle().await;
    assert_eq!(state.last_active_playing_tab_id, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_usage_codes_drive_hold_and_are_recorded() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.usage(0x00B4);
    let state = h.settle().await;
    assert_eq!(state.held_action, Some(HeldAction::Rewind));
    assert_eq!(state.hid_status.last_usage_id, Some(0x00B4));

    h.handle.usage(0x00E9);
    let state = h.settle().await;
    assert_eq!(state.held_action, Some(HeldAction::Rewind));
    assert_eq!(state.hid_status.last_usage_id, Some(0x00E9));

    h.handle.usage(0x0000);
    let state = h.settle().await;
    assert_eq!(state.held_action, None);
    assert_eq!(state.hid_status.last_usage_id, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_device_disconnect_releases_and_publishes() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));
    let mut status = h.handle.subscribe_status();

    h.handle.device_status(DeviceStatusUpdate::listening_on("Foot Pedal"));
    h.handle.usage(0x00B3);
    let state = h.settle().await;
    assert_eq!(state.held_action, Some(HeldAction::Forward));
    assert!(status.has_changed().unwrap());
    assert_eq!(
        status.borrow_and_update().product_name.as_deref(),
        Some("Foot Pedal")
    );

    h.handle.device_status(DeviceStatusUpdate {
        connected: Some(false),
        ..DeviceStatusUpdate::default()
    });
    let state = h.settle().await;

    assert_eq!(state.held_action, None);
    assert!(!state.hid_status.connected);
    assert!(!status.borrow_and_update().connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_device_and_releases() {
    let h = Harness::spawn(FakeBrowser::new().with_active(5, PLAYING));

    h.handle.press(HeldAction::Forward);
    h.settle().await;
    h.handle.disconnect();
    let state = h.settle().await;

    assert_eq!(state.held_action, None);
    assert_eq!(h.link.stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_granted_starts_device() {
    let h = Harness::spawn(FakeBrowser::new());
    let hint = ConnectHint {
        product_name: Some("Foot Pedal".to_string()),
        ..ConnectHint::default()
    };

    h.handle.connect_granted(Some(hint.clone()));
    h.settle().await;

    assert_eq!(h.link.starts.lock().unwrap().as_slice(), &[Some(hint)]);
}

#[tokio::test(start_paused = true)]
async fn test_release_with_nothing_held_is_harmless() {
    let h = Harness::spawn(FakeBrowser::new());

    h.handle.release();
    h.handle.release();
    let state = h.settle().await;

    assert_eq!(state.held_action, None);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_from_previous_hold_is_ignored() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    let link = Arc::new(super::support::RecordingLink::default());
    let (_handle, inbox) = coordinator::channel();
    let (mut coordinator, _rx) =
        Coordinator::new(browser, link, &RepeatSettings::default(), inbox);

    coordinator.on_press(HeldAction::Forward).await;
    let old = coordinator.held_state().generation();
    coordinator.on_release();
    coordinator.on_press(HeldAction::Forward).await;
    assert_ne!(coordinator.held_state().generation(), old);

    for _ in 0..3 {
        coordinator
            .handle(CoordinatorEvent::SeekCompleted {
                generation: old,
                tab_id: 5,
                success: false,
            })
            .await;
    }

    assert!(coordinator.held_state().is_held());
    assert_eq!(coordinator.held_state().repeat_fail_count(), 0);
    assert_eq!(coordinator.repeat_phase(), RepeatPhase::PendingStart);
}

#[tokio::test(start_paused = true)]
async fn test_stale_tick_after_release_does_not_seek() {
    let browser = FakeBrowser::new().with_active(5, PLAYING);
    let link = Arc::new(super::support::RecordingLink::default());
    let (_handle, inbox) = coordinator::channel();
    let (mut coordinator, _rx) =
        Coordinator::new(browser.clone(), link, &RepeatSettings::default(), inbox);

    coordinator.on_press(HeldAction::Forward).await;
    coordinator.on_release();

    coordinator
        .handle(CoordinatorEvent::RepeatDelayElapsed { epoch: 1 })
        .await;
    coordinator
        .handle(CoordinatorEvent::RepeatTick { epoch: 1 })
        .await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(coordinator.repeat_phase(), RepeatPhase::Idle);
    assert_eq!(browser.seek_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_playing_observation_after_close_is_ignored() {
    let browser = FakeBrowser::new().with_active(3, PLAYING);
    let link = Arc::new(super::support::RecordingLink::default());
    let (_handle, inbox) = coordinator::channel();
    let (mut coordinator, mut rx) =
        Coordinator::new(browser, link, &RepeatSettings::default(), inbox);

    coordinator.on_tab_activated(3);
    let observed = rx.recv().await.unwrap();
    assert!(matches!(
        observed,
        CoordinatorEvent::PlayingTabObserved { tab_id: 3, .. }
    ));

    coordinator.on_tab_closed(3);
    coordinator.handle(observed).await;

    assert_eq!(coordinator.held_state().last_active_playing_tab_id(), None);
}
