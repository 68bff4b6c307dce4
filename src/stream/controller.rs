// SPDX-License-Identifier: GPL-3.0-only

//! Stream configuration controller
//!
//! Owns the lifecycle of the camera preview: serializes all reconfiguration
//! requests into one logical attempt, iterates device/mode/resolution
//! candidates until one works, and re-runs failed passes after a short delay
//! while the app is not suspended.
//!
//! Concurrency model: cooperative. All work interleaves at explicit await
//! points; candidates are tried strictly sequentially because stream
//! acquisition is an exclusive-hardware operation. The only shared mutable
//! slot is the single active attempt, guarded by `State.attempt`.

use super::types::*;
use super::{DeviceControl, DeviceEnumerator, ModeNegotiator, Notifier, PreviewSink, SuspensionOracle};
use crate::config::ControllerConfig;
use crate::errors::CandidateError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Attempt slot: at most one configuration pass runs at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Idle,
    Configuring,
}

/// Handle for the single pending retry timer.
///
/// Dropping the handle cancels the timer: the sleeping task selects on the
/// paired receiver and exits when the sender goes away.
struct RetryHandle {
    _cancel: oneshot::Sender<()>,
}

/// Winning candidate of a configuration pass
struct Winner {
    device: DeviceId,
    facing: Option<FacingMode>,
}

/// Why a configuration pass ended without a working stream
enum PassFailure {
    /// Suspension detected between candidates. Silent: no warning, no retry;
    /// resumption is externally triggered.
    Suspended,
    /// Every candidate across every device failed
    Exhausted,
}

struct State {
    attempt: Attempt,
    /// Callers that joined the in-flight attempt; all resolved together when
    /// the attempt settles
    waiters: Vec<oneshot::Sender<bool>>,
    /// Device backing the running preview. Non-null only while a preview is
    /// actually live; cleared synchronously with any stop.
    active_device: Option<DeviceId>,
    /// Baseline for the device-switch announcement. Survives the teardown at
    /// the start of a pass (a same-device reconfigure stays silent); cleared
    /// when a pass fails.
    announced_device: Option<DeviceId>,
    facing: Option<FacingMode>,
    /// Mode of the last request; retries reuse it
    current_mode: Mode,
    retry: Option<RetryHandle>,
    /// Invalidates retry firings that lost a race against a newer schedule
    /// or an explicit request
    retry_gen: u64,
}

/// Stops the preview when dropped, so teardown runs even if interrupting an
/// in-flight capture unwinds
struct StopPreviewGuard<'a>(&'a StreamController);

impl Drop for StopPreviewGuard<'_> {
    fn drop(&mut self) {
        self.0.stop_preview();
    }
}

/// Camera stream configuration controller
///
/// Created once per app window and lives for the window's lifetime.
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct StreamController {
    enumerator: Arc<dyn DeviceEnumerator>,
    negotiator: Arc<dyn ModeNegotiator>,
    preview: Arc<dyn PreviewSink>,
    suspension: Arc<dyn SuspensionOracle>,
    notifier: Arc<dyn Notifier>,
    retry_delay: Duration,
    state: Arc<Mutex<State>>,
    /// Observer-facing busy flag; stays up across failed passes until a
    /// preview actually works
    configuring: Arc<watch::Sender<bool>>,
}

impl StreamController {
    pub fn new(
        enumerator: Arc<dyn DeviceEnumerator>,
        negotiator: Arc<dyn ModeNegotiator>,
        preview: Arc<dyn PreviewSink>,
        suspension: Arc<dyn SuspensionOracle>,
        notifier: Arc<dyn Notifier>,
        config: ControllerConfig,
    ) -> Self {
        info!(default_mode = %config.default_mode, "Creating stream controller");

        let (configuring, _) = watch::channel(false);

        Self {
            enumerator,
            negotiator,
            preview,
            suspension,
            notifier,
            retry_delay: config.retry_delay(),
            state: Arc::new(Mutex::new(State {
                attempt: Attempt::Idle,
                waiters: Vec::new(),
                active_device: None,
                announced_device: None,
                facing: None,
                current_mode: config.default_mode,
                retry: None,
                retry_gen: 0,
            })),
            configuring: Arc::new(configuring),
        }
    }

    /// Bring the preview to a working state for the given mode (or the last
    /// requested mode when `None`).
    ///
    /// If an attempt is already in flight the caller joins it and resolves
    /// with that attempt's result instead of starting a second pass.
    ///
    /// Returns `true` if the pass produced a live, working preview; `false`
    /// if every candidate failed (a retry has been scheduled) or suspension
    /// aborted the pass (no retry; resumption is externally triggered).
    ///
    /// The returned future is expected to be driven to completion; spawn it
    /// when the caller may go away early.
    pub async fn request_configuration(&self, mode: Option<Mode>) -> bool {
        let join = {
            let mut state = self.state.lock().unwrap();
            match state.attempt {
                Attempt::Configuring => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push(tx);
                    Some(rx)
                }
                Attempt::Idle => {
                    state.attempt = Attempt::Configuring;
                    if let Some(mode) = mode {
                        state.current_mode = mode;
                    }
                    // A fresh attempt supersedes any pending retry.
                    state.retry = None;
                    state.retry_gen = state.retry_gen.wrapping_add(1);
                    None
                }
            }
        };

        if let Some(rx) = join {
            return rx.await.unwrap_or(false);
        }

        let mode = self.state.lock().unwrap().current_mode;
        debug!(mode = %mode, "Starting stream configuration");
        self.configuring.send_replace(true);

        {
            let _stop = StopPreviewGuard(self);
            if self.negotiator.capture_in_progress() {
                self.negotiator.interrupt_capture().await;
            }
        }

        self.run_pass(mode).await
    }

    /// Stop the preview and cancel any pending retry.
    ///
    /// Does not preempt an in-flight pass (stream acquisition cannot be
    /// forcibly interrupted mid-call); idempotent.
    pub fn shutdown(&self) {
        info!("Shutting down stream controller");
        {
            let mut state = self.state.lock().unwrap();
            state.retry = None;
            state.retry_gen = state.retry_gen.wrapping_add(1);
            state.announced_device = None;
        }
        self.stop_preview();
    }

    /// Device id of the camera backing the running preview, if any
    pub fn active_device_id(&self) -> Option<DeviceId> {
        self.state.lock().unwrap().active_device.clone()
    }

    /// Facing of the active camera, when the platform reports it
    pub fn facing(&self) -> Option<FacingMode> {
        self.state.lock().unwrap().facing
    }

    /// Mode of the last configuration request
    pub fn current_mode(&self) -> Mode {
        self.state.lock().unwrap().current_mode
    }

    /// Whether the controller is between "configuration requested" and
    /// "preview working" (stays `true` while retries are pending)
    pub fn is_configuring(&self) -> bool {
        *self.configuring.borrow()
    }

    /// Watch the busy flag, e.g. to drive a UI spinner
    pub fn subscribe_configuring(&self) -> watch::Receiver<bool> {
        self.configuring.subscribe()
    }

    /// Whether a retry is currently scheduled
    pub fn retry_pending(&self) -> bool {
        self.state.lock().unwrap().retry.is_some()
    }

    fn stop_preview(&self) {
        self.preview.stop();
        let mut state = self.state.lock().unwrap();
        state.active_device = None;
        state.facing = None;
    }

    /// Run one configuration pass and apply its side effects
    async fn run_pass(&self, mode: Mode) -> bool {
        match self.configure_once(mode).await {
            Ok(winner) => {
                self.notifier.clear_no_camera();
                let previous = {
                    let mut state = self.state.lock().unwrap();
                    state.active_device = Some(winner.device.clone());
                    state.facing = winner.facing;
                    state.announced_device.replace(winner.device.clone())
                };
                if previous.as_ref() != Some(&winner.device) {
                    let label = self
                        .enumerator
                        .device_label(&winner.device)
                        .await
                        .unwrap_or_else(|| winner.device.to_string());
                    self.notifier.announce_device_switch(&label);
                }
                info!(device = %winner.device, mode = %mode, "Stream configured");
                self.configuring.send_replace(false);
                self.settle(true);
                true
            }
            Err(PassFailure::Suspended) => {
                debug!(mode = %mode, "Configuration aborted: suspended");
                self.clear_active();
                self.settle(false);
                false
            }
            Err(PassFailure::Exhausted) => {
                error!(mode = %mode, "No candidate produced a working stream");
                self.clear_active();
                self.notifier.warn_no_camera();
                self.schedule_retry(mode);
                self.settle(false);
                false
            }
        }
    }

    /// One full candidate-iteration pass
    async fn configure_once(&self, mode: Mode) -> Result<Winner, PassFailure> {
        if self.suspension.is_suspended() {
            return Err(PassFailure::Suspended);
        }

        let control = self.enumerator.device_control().await;
        if control.is_none() {
            debug!("Per-device control API unavailable, using legacy candidates");
        }

        let devices = match self.enumerator.list_device_ids().await {
            Ok(devices) => devices,
            Err(e) => {
                // Nothing enumerated at all degenerates into exhaustion.
                error!(error = %e, "Device enumeration failed");
                return Err(PassFailure::Exhausted);
            }
        };

        for device in &devices {
            if self.suspension.is_suspended() {
                return Err(PassFailure::Suspended);
            }
            if let Some(winner) = self.try_device(device, mode, control.as_ref()).await? {
                return Ok(winner);
            }
        }
        Err(PassFailure::Exhausted)
    }

    /// Try every acceptable mode on one device
    async fn try_device(
        &self,
        device: &DeviceId,
        requested: Mode,
        control: Option<&Arc<dyn DeviceControl>>,
    ) -> Result<Option<Winner>, PassFailure> {
        let supported = match self.negotiator.supported_modes(device).await {
            Ok(modes) => modes,
            Err(e) => {
                warn!(device = %device, error = %e, "Skipping device: mode query failed");
                return Ok(None);
            }
        };

        for mode in self
            .negotiator
            .mode_candidates(requested)
            .into_iter()
            .filter(|m| supported.contains(m))
        {
            if let Some(winner) = self.try_mode(device, mode, control).await? {
                return Ok(Some(winner));
            }
        }
        Ok(None)
    }

    /// Try every resolution candidate of one (device, mode) pair
    async fn try_mode(
        &self,
        device: &DeviceId,
        mode: Mode,
        control: Option<&Arc<dyn DeviceControl>>,
    ) -> Result<Option<Winner>, PassFailure> {
        let candidates = match control {
            Some(_) => {
                let resolutions = match self.enumerator.preview_resolutions(device).await {
                    Ok(resolutions) => resolutions,
                    Err(e) => {
                        warn!(device = %device, error = %e, "Capability inspection failed");
                        return Ok(None);
                    }
                };
                match self
                    .negotiator
                    .resolution_candidates(mode, device, &resolutions)
                    .await
                {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!(device = %device, mode = %mode, error = %e, "Candidate negotiation failed");
                        return Ok(None);
                    }
                }
            }
            None => match self.negotiator.resolution_candidates_legacy(mode, device).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(device = %device, mode = %mode, error = %e, "Legacy candidate negotiation failed");
                    return Ok(None);
                }
            },
        };

        for candidate in &candidates {
            for constraints in &candidate.previews {
                if self.suspension.is_suspended() {
                    return Err(PassFailure::Suspended);
                }
                match self
                    .try_candidate(device, mode, candidate.capture, constraints, control)
                    .await
                {
                    Ok(winner) => return Ok(Some(winner)),
                    Err(e) => {
                        self.preview.stop();
                        warn!(constraints = %constraints, error = %e, "Candidate failed");
                    }
                }
            }
        }
        Ok(None)
    }

    /// Try one (device, mode, capture resolution, constraints) candidate
    async fn try_candidate(
        &self,
        device: &DeviceId,
        mode: Mode,
        capture: Resolution,
        constraints: &StreamConstraints,
        control: Option<&Arc<dyn DeviceControl>>,
    ) -> Result<Winner, CandidateError> {
        if let Some(control) = control {
            control.set_fps_range(device, constraints).await?;
            control
                .set_capture_intent(device, self.negotiator.capture_intent(mode))
                .await?;
        }

        let stream = self.preview.start(constraints).await?;
        self.negotiator.activate(mode, &stream, device, capture).await?;

        debug!(
            device = %device,
            mode = %mode,
            capture = %capture,
            preview = %stream.resolution,
            "Candidate succeeded"
        );
        Ok(Winner {
            device: device.clone(),
            facing: stream.facing,
        })
    }

    fn clear_active(&self) {
        let mut state = self.state.lock().unwrap();
        state.active_device = None;
        state.announced_device = None;
        state.facing = None;
    }

    /// Return to `Idle` and resolve every joined caller with the result
    fn settle(&self, result: bool) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.attempt = Attempt::Idle;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(result);
        }
    }

    /// Schedule the single delayed re-entry into configuration, replacing
    /// any pending one
    fn schedule_retry(&self, mode: Mode) {
        let mut state = self.state.lock().unwrap();
        state.retry = None;
        state.retry_gen = state.retry_gen.wrapping_add(1);
        let generation = state.retry_gen;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let controller = self.clone();
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => controller.retry_fire(generation, mode).await,
                _ = cancel_rx => {}
            }
        });

        state.retry = Some(RetryHandle { _cancel: cancel_tx });
        debug!(delay_ms = delay.as_millis() as u64, mode = %mode, "Retry scheduled");
    }

    /// Timer expiry: re-enter the pass unless a newer schedule or an
    /// explicit request superseded this timer
    async fn retry_fire(&self, generation: u64, mode: Mode) {
        {
            let mut state = self.state.lock().unwrap();
            if state.retry_gen != generation || state.attempt == Attempt::Configuring {
                return;
            }
            state.retry = None;
            state.attempt = Attempt::Configuring;
        }
        debug!(mode = %mode, "Retrying stream configuration");
        // No teardown here: a failed pass leaves no live preview behind.
        self.run_pass(mode).await;
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("StreamController")
            .field("attempt", &state.attempt)
            .field("active_device", &state.active_device)
            .field("current_mode", &state.current_mode)
            .field("retry_pending", &state.retry.is_some())
            .finish()
    }
}
