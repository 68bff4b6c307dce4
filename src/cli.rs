// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the controller demo
//!
//! Drives the stream controller against the virtual device hub so the
//! state machine can be watched from a terminal: candidate iteration,
//! retries after exhaustion, silent suspension aborts, device switches.

use camera_stream::config::ControllerConfig;
use camera_stream::stream::{FacingMode, Mode, Resolution, StreamController};
use camera_stream::virtual_device::{StartBehavior, VirtualDeviceHub, VirtualDeviceSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn demo_hub(flaky: bool) -> Arc<VirtualDeviceHub> {
    let hub = VirtualDeviceHub::new();
    hub.add_device(
        VirtualDeviceSpec::new("cam0", "Built-in Camera")
            .modes(vec![Mode::Photo, Mode::Video, Mode::Square, Mode::Portrait])
            .facing(FacingMode::User)
            .start_behavior(if flaky {
                StartBehavior::FailTimes(3)
            } else {
                StartBehavior::Succeed
            }),
    );
    hub.add_device(
        VirtualDeviceSpec::new("cam1", "USB Camera")
            .facing(FacingMode::External)
            .resolutions(vec![Resolution::new(1280, 720), Resolution::new(640, 480)]),
    );
    hub
}

/// List the demo's virtual devices
pub fn list_devices(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let hub = demo_hub(false);
    let specs = hub.device_specs();

    if json {
        let devices: Vec<serde_json::Value> = specs
            .iter()
            .map(|spec| {
                serde_json::json!({
                    "id": spec.id.as_str(),
                    "label": spec.label,
                    "modes": spec.modes.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
                    "resolutions": spec
                        .resolutions
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("Available devices:");
    println!();
    for (index, spec) in specs.iter().enumerate() {
        println!("  [{}] {} ({})", index, spec.label, spec.id);

        let modes: Vec<&str> = spec.modes.iter().map(|m| m.display_name()).collect();
        println!("      Modes: {}", modes.join(", "));

        let resolutions: Vec<String> = spec.resolutions.iter().map(|r| r.to_string()).collect();
        println!("      Resolutions: {}", resolutions.join(", "));
        println!();
    }

    Ok(())
}

/// Run the controller against the virtual hub until Ctrl-C
pub async fn run_preview(
    mode: Mode,
    flaky: bool,
    suspend_after: Option<u64>,
    resume_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let hub = demo_hub(flaky);
    let controller = StreamController::new(
        hub.clone(),
        hub.clone(),
        hub.clone(),
        hub.clone(),
        hub.clone(),
        ControllerConfig {
            default_mode: mode,
            ..Default::default()
        },
    );

    let ok = controller.request_configuration(None).await;
    match controller.active_device_id() {
        Some(device) => info!(%device, "Preview configured"),
        None => info!(ok, "Initial configuration did not produce a preview"),
    }

    if let Some(secs) = suspend_after {
        let hub = hub.clone();
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Suspending (simulated lock screen)");
            hub.set_suspended(true);
            // Mirrors the lock/minimize handlers: a request while suspended
            // stops the preview and resolves false without a warning.
            controller.request_configuration(None).await;

            if let Some(resume) = resume_after {
                tokio::time::sleep(Duration::from_secs(resume)).await;
                info!("Resuming");
                hub.set_suspended(false);
                controller.request_configuration(None).await;
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    controller.shutdown();

    let events = hub.events();
    info!(
        events = events.len(),
        announcements = hub.announcements().len(),
        warnings = hub.warning_count(),
        "Demo finished"
    );
    Ok(())
}
