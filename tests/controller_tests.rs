// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the stream configuration controller
//!
//! All tests run on a paused clock so the retry timer can be driven
//! deterministically with `tokio::time::advance`.

use camera_stream::config::ControllerConfig;
use camera_stream::constants::RETRY_START_DELAY;
use camera_stream::stream::{DeviceId, Mode, Resolution, StreamController};
use camera_stream::virtual_device::{
    HubEvent, StartBehavior, VirtualDeviceHub, VirtualDeviceSpec,
};
use std::sync::Arc;
use std::time::Duration;

fn controller_for(hub: &Arc<VirtualDeviceHub>) -> StreamController {
    StreamController::new(
        hub.clone(),
        hub.clone(),
        hub.clone(),
        hub.clone(),
        hub.clone(),
        ControllerConfig::default(),
    )
}

/// Let spawned tasks (e.g. a fired retry) run without advancing the clock
async fn drain_tasks() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_collapse_into_one_pass() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    let controller = controller_for(&hub);

    let results = futures::future::join_all((0..5).map(|_| {
        let controller = controller.clone();
        async move { controller.request_configuration(None).await }
    }))
    .await;

    assert!(results.iter().all(|&ok| ok));
    assert_eq!(hub.enumeration_count(), 1, "joiners must not start passes");
    assert_eq!(hub.max_live_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn joiner_resolves_false_when_attempt_fails() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .start_behavior(StartBehavior::Fail),
    );
    let controller = controller_for(&hub);

    let initiator = tokio::spawn({
        let controller = controller.clone();
        async move { controller.request_configuration(None).await }
    });
    // Let the initiator get into its pass before joining.
    tokio::task::yield_now().await;
    let joined = controller.request_configuration(None).await;

    assert!(!joined);
    assert!(!initiator.await.unwrap());
    assert_eq!(hub.enumeration_count(), 1);

    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn first_success_wins_and_later_candidates_are_not_tried() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .resolutions(vec![
                Resolution::new(1920, 1080),
                Resolution::new(1280, 720),
                Resolution::new(640, 480),
            ])
            // First candidate fails, second works, third must never run.
            .start_behavior(StartBehavior::FailTimes(1)),
    );
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);

    let attempts = hub.start_attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].resolution, Resolution::new(1920, 1080));
    assert_eq!(attempts[1].resolution, Resolution::new(1280, 720));
}

#[tokio::test(start_paused = true)]
async fn suspension_before_any_device_is_silent() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    hub.set_suspended(true);
    let controller = controller_for(&hub);

    let ok = controller.request_configuration(None).await;

    assert!(!ok);
    assert_eq!(hub.warning_count(), 0, "suspension must not warn");
    assert!(!controller.retry_pending(), "suspension must not schedule a retry");
    assert!(controller.active_device_id().is_none());

    tokio::time::advance(Duration::from_secs(2)).await;
    drain_tasks().await;
    assert_eq!(hub.enumeration_count(), 0, "no pass may run while nothing retries");
}

#[tokio::test(start_paused = true)]
async fn suspension_mid_pass_aborts_before_next_device() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("camA", "Camera A")
            .resolutions(vec![Resolution::new(1280, 720)])
            .start_behavior(StartBehavior::Fail),
    );
    hub.add_device(VirtualDeviceSpec::new("camB", "Camera B"));
    // Lock screen kicks in right after camA's only candidate fails.
    hub.suspend_after_start_failures(1);
    let controller = controller_for(&hub);

    let ok = controller.request_configuration(None).await;

    assert!(!ok);
    let attempts = hub.start_attempts();
    assert_eq!(attempts.len(), 1, "camB must not be tried after suspension");
    assert_eq!(attempts[0].device_id, DeviceId::from("camA"));
    assert_eq!(hub.warning_count(), 0);
    assert!(!controller.retry_pending());
    assert!(controller.active_device_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);
    assert_eq!(hub.live_streams(), 1);

    controller.shutdown();
    controller.shutdown();

    assert_eq!(hub.live_streams(), 0);
    assert!(controller.active_device_id().is_none());

    // Two back-to-back passes never hold two streams at once.
    assert!(controller.request_configuration(None).await);
    assert!(controller.request_configuration(None).await);
    assert_eq!(hub.max_live_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn device_switch_notice_fires_only_on_change() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("camA", "Camera A"));
    hub.add_device(VirtualDeviceSpec::new("camB", "Camera B"));
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);
    assert_eq!(hub.announcements(), vec!["Camera A".to_string()]);

    // Same device again (e.g. a resolution-only change): silent.
    assert!(controller.request_configuration(None).await);
    assert_eq!(hub.announcements().len(), 1);

    // camA goes away; the pass lands on camB and announces exactly once.
    hub.set_start_behavior(&DeviceId::from("camA"), StartBehavior::Fail);
    assert!(controller.request_configuration(None).await);
    assert_eq!(
        hub.announcements(),
        vec!["Camera A".to_string(), "Camera B".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn only_one_retry_is_pending_after_consecutive_failures() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .start_behavior(StartBehavior::Fail)
            .resolutions(vec![Resolution::new(640, 480)]),
    );
    let controller = controller_for(&hub);

    assert!(!controller.request_configuration(None).await);
    assert!(!controller.request_configuration(None).await);
    assert_eq!(hub.enumeration_count(), 2);
    assert!(controller.retry_pending());

    // One retry interval passes: exactly one more pass, not two.
    drain_tasks().await;
    tokio::time::advance(RETRY_START_DELAY).await;
    drain_tasks().await;
    assert_eq!(hub.enumeration_count(), 3);

    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failing_device_falls_through_to_working_one() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("camA", "Camera A")
            .resolutions(vec![Resolution::new(1920, 1080)])
            .start_behavior(StartBehavior::Fail),
    );
    hub.add_device(VirtualDeviceSpec::new("camB", "Camera B"));
    let controller = controller_for(&hub);

    let ok = controller.request_configuration(None).await;

    assert!(ok);
    assert_eq!(controller.active_device_id(), Some(DeviceId::from("camB")));
    assert_eq!(hub.announcements(), vec!["Camera B".to_string()]);
    assert_eq!(hub.warning_count(), 0);
    assert!(!hub.warning_visible());
}

#[tokio::test(start_paused = true)]
async fn exhaustion_warns_and_retries_at_the_fixed_delay() {
    let hub = VirtualDeviceHub::new();
    // The only device cannot serve photo at all.
    hub.add_device(VirtualDeviceSpec::new("cam0", "Rear Camera").modes(vec![Mode::Video]));
    let controller = controller_for(&hub);

    let ok = controller.request_configuration(Some(Mode::Photo)).await;

    assert!(!ok);
    assert_eq!(hub.warning_count(), 1);
    assert!(hub.warning_visible());
    assert!(controller.retry_pending());
    assert!(controller.active_device_id().is_none());

    // Just short of the delay: nothing fires.
    drain_tasks().await;
    tokio::time::advance(RETRY_START_DELAY - Duration::from_millis(1)).await;
    drain_tasks().await;
    assert_eq!(hub.enumeration_count(), 1);

    // Crossing the delay fires exactly one re-entry, with the same mode.
    tokio::time::advance(Duration::from_millis(1)).await;
    drain_tasks().await;
    assert_eq!(hub.enumeration_count(), 2);

    controller.shutdown();
}

#[tokio::test(start_paused = true)]
async fn retry_reuses_the_requested_mode() {
    let hub = VirtualDeviceHub::new();
    let controller = controller_for(&hub);

    // No devices yet: the video request fails and schedules a retry.
    assert!(!controller.request_configuration(Some(Mode::Video)).await);
    assert!(controller.retry_pending());

    // A camera shows up before the retry fires.
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    drain_tasks().await;
    tokio::time::advance(RETRY_START_DELAY).await;
    drain_tasks().await;

    assert_eq!(controller.active_device_id(), Some(DeviceId::from("cam0")));
    assert_eq!(controller.current_mode(), Mode::Video);
    assert!(hub.events().contains(&HubEvent::Activated {
        device: DeviceId::from("cam0"),
        mode: Mode::Video,
    }));
}

#[tokio::test(start_paused = true)]
async fn explicit_request_supersedes_a_pending_retry() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Rear Camera").modes(vec![Mode::Video]));
    let controller = controller_for(&hub);

    assert!(!controller.request_configuration(Some(Mode::Photo)).await);
    assert!(controller.retry_pending());

    // The user switches to video before the retry fires; the new attempt
    // wins and the stale timer must not run another pass afterwards.
    assert!(controller.request_configuration(Some(Mode::Video)).await);
    assert!(!controller.retry_pending());
    let passes = hub.enumeration_count();

    tokio::time::advance(Duration::from_secs(2)).await;
    drain_tasks().await;
    assert_eq!(hub.enumeration_count(), passes);
}

#[tokio::test(start_paused = true)]
async fn legacy_candidates_are_used_without_device_control() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    hub.set_device_control(false);
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);

    let events = hub.events();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, HubEvent::FpsRangeSet(_) | HubEvent::CaptureIntentSet(..))),
        "no control calls may happen on the legacy path"
    );
    assert_eq!(hub.live_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn activation_failure_skips_the_candidate_and_stops_its_stream() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("camA", "Camera A")
            .resolutions(vec![Resolution::new(1280, 720)])
            .fail_activation(true),
    );
    hub.add_device(VirtualDeviceSpec::new("camB", "Camera B"));
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);
    assert_eq!(controller.active_device_id(), Some(DeviceId::from("camB")));

    // camA's stream came up and was torn down again before camB was tried.
    let events = hub.events();
    let started_a = events
        .iter()
        .position(|e| matches!(e, HubEvent::StreamStarted(id) if *id == DeviceId::from("camA")))
        .expect("camA stream must have started");
    let stopped = events[started_a..]
        .iter()
        .position(|e| matches!(e, HubEvent::StreamStopped));
    let started_b = events[started_a..]
        .iter()
        .position(|e| matches!(e, HubEvent::StreamStarted(id) if *id == DeviceId::from("camB")))
        .expect("camB stream must have started");
    assert!(stopped.unwrap() < started_b);
    assert_eq!(hub.live_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsupported_mode_falls_back_along_the_mode_chain() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera").modes(vec![Mode::Photo]));
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(Some(Mode::Portrait)).await);
    assert!(hub.events().contains(&HubEvent::Activated {
        device: DeviceId::from("cam0"),
        mode: Mode::Photo,
    }));
}

#[tokio::test(start_paused = true)]
async fn in_flight_capture_is_interrupted_before_reconfiguring() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    let controller = controller_for(&hub);

    assert!(controller.request_configuration(None).await);

    hub.set_capture_in_progress(true);
    assert!(controller.request_configuration(None).await);
    assert_eq!(hub.interrupted_captures(), 1);

    // The old preview stopped before the new pass enumerated devices.
    let events = hub.events();
    let second_enumeration = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, HubEvent::Enumerated))
        .map(|(i, _)| i)
        .nth(1)
        .unwrap();
    let stop_before = events[..second_enumeration]
        .iter()
        .any(|e| matches!(e, HubEvent::StreamStopped));
    assert!(stop_before);
}

#[tokio::test(start_paused = true)]
async fn enumeration_failure_degenerates_into_exhaustion() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(VirtualDeviceSpec::new("cam0", "Built-in Camera"));
    hub.set_fail_enumeration(true);
    let controller = controller_for(&hub);

    let ok = controller.request_configuration(None).await;

    assert!(!ok);
    assert_eq!(hub.warning_count(), 1);
    assert!(controller.retry_pending());

    controller.shutdown();
    assert!(!controller.retry_pending());
}

#[tokio::test(start_paused = true)]
async fn configuring_flag_stays_up_until_a_preview_works()
{
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .resolutions(vec![Resolution::new(640, 480)])
            .start_behavior(StartBehavior::Fail),
    );
    let controller = controller_for(&hub);
    assert!(!controller.is_configuring());

    assert!(!controller.request_configuration(None).await);
    // Still busy: a retry is pending and no preview works yet.
    assert!(controller.is_configuring());

    hub.set_start_behavior(&DeviceId::from("cam0"), StartBehavior::Succeed);
    drain_tasks().await;
    tokio::time::advance(RETRY_START_DELAY).await;
    drain_tasks().await;

    assert!(!controller.is_configuring());
    assert_eq!(controller.active_device_id(), Some(DeviceId::from("cam0")));
}

#[tokio::test(start_paused = true)]
async fn success_clears_the_no_camera_warning() {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .resolutions(vec![Resolution::new(640, 480)])
            .start_behavior(StartBehavior::FailTimes(1)),
    );
    let controller = controller_for(&hub);

    // First pass exhausts (single candidate fails) and warns.
    assert!(!controller.request_configuration(None).await);
    assert!(hub.warning_visible());

    // The scheduled retry succeeds and dismisses the warning.
    drain_tasks().await;
    tokio::time::advance(RETRY_START_DELAY).await;
    drain_tasks().await;
    assert!(!hub.warning_visible());
    assert_eq!(controller.active_device_id(), Some(DeviceId::from("cam0")));
}
