// SPDX-License-Identifier: GPL-3.0-only

//! Virtual device hub
//!
//! An in-memory implementation of every collaborator trait the stream
//! controller depends on. Devices are scripted: id, label, supported modes,
//! resolution lists, and per-device start behavior (succeed, always fail,
//! fail the first N attempts). The hub records everything the controller
//! does — streams started and stopped, warnings, announcements — so the CLI
//! demo can narrate a run and the integration tests can assert on it.

use crate::constants::{VIRTUAL_DEFAULT_FPS, VIRTUAL_PREVIEW_RESOLUTIONS};
use crate::errors::{AcquisitionError, CandidateError, ControlError, EnumerationError};
use crate::stream::{
    CaptureIntent, DeviceControl, DeviceEnumerator, DeviceId, FacingMode, Framerate, Mode,
    ModeNegotiator, Notifier, PreviewResolutions, PreviewSink, PreviewStream, ResolutionCandidate,
    Resolution, StreamConstraints, SuspensionOracle,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// How a virtual device answers stream acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    /// Every acquisition succeeds
    Succeed,
    /// Every acquisition fails with `AcquisitionError::Busy`
    Fail,
    /// The first N acquisitions fail, later ones succeed
    FailTimes(usize),
}

/// Scripted description of one virtual device
#[derive(Debug, Clone)]
pub struct VirtualDeviceSpec {
    pub id: DeviceId,
    pub label: String,
    pub modes: Vec<Mode>,
    pub facing: Option<FacingMode>,
    pub resolutions: Vec<Resolution>,
    pub start_behavior: StartBehavior,
    /// Fail the post-acquisition activation step instead of the acquisition
    pub fail_activation: bool,
}

impl VirtualDeviceSpec {
    pub fn new(id: impl Into<DeviceId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            modes: vec![Mode::Photo, Mode::Video],
            facing: None,
            resolutions: VIRTUAL_PREVIEW_RESOLUTIONS
                .iter()
                .map(|&(w, h)| Resolution::new(w, h))
                .collect(),
            start_behavior: StartBehavior::Succeed,
            fail_activation: false,
        }
    }

    pub fn modes(mut self, modes: Vec<Mode>) -> Self {
        self.modes = modes;
        self
    }

    pub fn facing(mut self, facing: FacingMode) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn resolutions(mut self, resolutions: Vec<Resolution>) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn start_behavior(mut self, behavior: StartBehavior) -> Self {
        self.start_behavior = behavior;
        self
    }

    pub fn fail_activation(mut self, fail: bool) -> Self {
        self.fail_activation = fail;
        self
    }
}

/// Everything observable the controller did to the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    Enumerated,
    StartAttempt(StreamConstraints),
    StreamStarted(DeviceId),
    StreamStopped,
    FpsRangeSet(DeviceId),
    CaptureIntentSet(DeviceId, CaptureIntent),
    Activated { device: DeviceId, mode: Mode },
    CaptureInterrupted,
    Warned,
    WarningCleared,
    Announced(String),
}

struct VirtualDevice {
    spec: VirtualDeviceSpec,
    remaining_failures: usize,
}

struct HubState {
    devices: Vec<VirtualDevice>,
    with_control: bool,
    fail_enumeration: bool,
    suspended: bool,
    /// Flip `suspended` once this many acquisitions have failed
    suspend_after_failures: Option<usize>,
    start_failures: usize,
    live_streams: usize,
    max_live_streams: usize,
    enumerations: usize,
    capture_in_progress: bool,
    warning_visible: bool,
    events: Vec<HubEvent>,
}

impl HubState {
    fn device(&mut self, id: &DeviceId) -> Option<&mut VirtualDevice> {
        self.devices.iter_mut().find(|d| d.spec.id == *id)
    }

    fn is_suspended(&self) -> bool {
        if self.suspended {
            return true;
        }
        match self.suspend_after_failures {
            Some(n) => self.start_failures >= n,
            None => false,
        }
    }
}

/// In-memory device hub implementing all controller collaborators
pub struct VirtualDeviceHub {
    inner: Arc<Mutex<HubState>>,
}

impl VirtualDeviceHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Mutex::new(HubState {
                devices: Vec::new(),
                with_control: true,
                fail_enumeration: false,
                suspended: false,
                suspend_after_failures: None,
                start_failures: 0,
                live_streams: 0,
                max_live_streams: 0,
                enumerations: 0,
                capture_in_progress: false,
                warning_visible: false,
                events: Vec::new(),
            })),
        })
    }

    pub fn add_device(&self, spec: VirtualDeviceSpec) {
        let mut state = self.inner.lock().unwrap();
        let remaining_failures = match spec.start_behavior {
            StartBehavior::FailTimes(n) => n,
            _ => 0,
        };
        state.devices.push(VirtualDevice {
            spec,
            remaining_failures,
        });
    }

    pub fn device_specs(&self) -> Vec<VirtualDeviceSpec> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .iter()
            .map(|d| d.spec.clone())
            .collect()
    }

    /// Rescript how a device answers stream acquisition
    pub fn set_start_behavior(&self, id: &DeviceId, behavior: StartBehavior) {
        let mut state = self.inner.lock().unwrap();
        if let Some(device) = state.device(id) {
            device.remaining_failures = match behavior {
                StartBehavior::FailTimes(n) => n,
                _ => 0,
            };
            device.spec.start_behavior = behavior;
        }
    }

    /// Disable the per-device control API to exercise the legacy path
    pub fn set_device_control(&self, enabled: bool) {
        self.inner.lock().unwrap().with_control = enabled;
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.inner.lock().unwrap().fail_enumeration = fail;
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.inner.lock().unwrap().suspended = suspended;
    }

    /// Report suspension once `n` stream acquisitions have failed
    pub fn suspend_after_start_failures(&self, n: usize) {
        self.inner.lock().unwrap().suspend_after_failures = Some(n);
    }

    pub fn set_capture_in_progress(&self, taking: bool) {
        self.inner.lock().unwrap().capture_in_progress = taking;
    }

    // ===== Inspection =====

    pub fn events(&self) -> Vec<HubEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn live_streams(&self) -> usize {
        self.inner.lock().unwrap().live_streams
    }

    /// Highest number of simultaneously live streams ever observed
    pub fn max_live_streams(&self) -> usize {
        self.inner.lock().unwrap().max_live_streams
    }

    pub fn enumeration_count(&self) -> usize {
        self.inner.lock().unwrap().enumerations
    }

    pub fn start_attempts(&self) -> Vec<StreamConstraints> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e {
                HubEvent::StartAttempt(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| matches!(e, HubEvent::Warned))
            .count()
    }

    pub fn warning_visible(&self) -> bool {
        self.inner.lock().unwrap().warning_visible
    }

    pub fn announcements(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e {
                HubEvent::Announced(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn interrupted_captures(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| matches!(e, HubEvent::CaptureInterrupted))
            .count()
    }
}

struct VirtualControl {
    inner: Arc<Mutex<HubState>>,
}

#[async_trait]
impl DeviceControl for VirtualControl {
    async fn set_fps_range(
        &self,
        device: &DeviceId,
        _constraints: &StreamConstraints,
    ) -> Result<(), ControlError> {
        let mut state = self.inner.lock().unwrap();
        if state.device(device).is_none() {
            return Err(ControlError::Disconnected);
        }
        state.events.push(HubEvent::FpsRangeSet(device.clone()));
        Ok(())
    }

    async fn set_capture_intent(
        &self,
        device: &DeviceId,
        intent: CaptureIntent,
    ) -> Result<(), ControlError> {
        let mut state = self.inner.lock().unwrap();
        if state.device(device).is_none() {
            return Err(ControlError::Disconnected);
        }
        state
            .events
            .push(HubEvent::CaptureIntentSet(device.clone(), intent));
        Ok(())
    }
}

#[async_trait]
impl DeviceEnumerator for VirtualDeviceHub {
    async fn list_device_ids(&self) -> Result<Vec<DeviceId>, EnumerationError> {
        // Real enumeration goes through the platform; yield like it would.
        tokio::task::yield_now().await;
        let mut state = self.inner.lock().unwrap();
        state.enumerations += 1;
        state.events.push(HubEvent::Enumerated);
        if state.fail_enumeration {
            return Err(EnumerationError::Backend("enumeration unavailable".into()));
        }
        Ok(state.devices.iter().map(|d| d.spec.id.clone()).collect())
    }

    async fn preview_resolutions(
        &self,
        device: &DeviceId,
    ) -> Result<PreviewResolutions, EnumerationError> {
        let mut state = self.inner.lock().unwrap();
        let device = state
            .device(device)
            .ok_or_else(|| EnumerationError::DeviceUnavailable(device.to_string()))?;
        Ok(PreviewResolutions {
            photo: device.spec.resolutions.clone(),
            video: device.spec.resolutions.clone(),
        })
    }

    async fn device_label(&self, device: &DeviceId) -> Option<String> {
        let mut state = self.inner.lock().unwrap();
        state.device(device).map(|d| d.spec.label.clone())
    }

    async fn device_control(&self) -> Option<Arc<dyn DeviceControl>> {
        let state = self.inner.lock().unwrap();
        if state.with_control {
            Some(Arc::new(VirtualControl {
                inner: Arc::clone(&self.inner),
            }))
        } else {
            None
        }
    }
}

#[async_trait]
impl ModeNegotiator for VirtualDeviceHub {
    async fn supported_modes(&self, device: &DeviceId) -> Result<Vec<Mode>, EnumerationError> {
        let mut state = self.inner.lock().unwrap();
        let device = state
            .device(device)
            .ok_or_else(|| EnumerationError::DeviceUnavailable(device.to_string()))?;
        Ok(device.spec.modes.clone())
    }

    async fn resolution_candidates(
        &self,
        mode: Mode,
        device: &DeviceId,
        resolutions: &PreviewResolutions,
    ) -> Result<Vec<ResolutionCandidate>, EnumerationError> {
        Ok(candidates_from(device, resolutions.for_mode(mode)))
    }

    async fn resolution_candidates_legacy(
        &self,
        _mode: Mode,
        device: &DeviceId,
    ) -> Result<Vec<ResolutionCandidate>, EnumerationError> {
        let mut state = self.inner.lock().unwrap();
        let found = state
            .device(device)
            .ok_or_else(|| EnumerationError::DeviceUnavailable(device.to_string()))?;
        Ok(candidates_from(device, &found.spec.resolutions))
    }

    async fn activate(
        &self,
        mode: Mode,
        _stream: &PreviewStream,
        device: &DeviceId,
        _capture: Resolution,
    ) -> Result<(), CandidateError> {
        let mut state = self.inner.lock().unwrap();
        let fail = state
            .device(device)
            .map(|d| d.spec.fail_activation)
            .unwrap_or(true);
        if fail {
            return Err(CandidateError::Activation(format!(
                "activation rejected on {}",
                device
            )));
        }
        state.events.push(HubEvent::Activated {
            device: device.clone(),
            mode,
        });
        Ok(())
    }

    fn capture_in_progress(&self) -> bool {
        self.inner.lock().unwrap().capture_in_progress
    }

    async fn interrupt_capture(&self) {
        let mut state = self.inner.lock().unwrap();
        state.capture_in_progress = false;
        state.events.push(HubEvent::CaptureInterrupted);
    }
}

fn candidates_from(device: &DeviceId, resolutions: &[Resolution]) -> Vec<ResolutionCandidate> {
    resolutions
        .iter()
        .map(|&capture| ResolutionCandidate {
            capture,
            previews: vec![StreamConstraints {
                device_id: device.clone(),
                resolution: capture,
                framerate: Some(Framerate::from_int(VIRTUAL_DEFAULT_FPS)),
            }],
        })
        .collect()
}

#[async_trait]
impl PreviewSink for VirtualDeviceHub {
    async fn start(&self, constraints: &StreamConstraints) -> Result<PreviewStream, AcquisitionError> {
        // Acquisition is an async platform call; yield like it would.
        tokio::task::yield_now().await;
        let mut state = self.inner.lock().unwrap();
        state
            .events
            .push(HubEvent::StartAttempt(constraints.clone()));

        let index = state
            .devices
            .iter()
            .position(|d| d.spec.id == constraints.device_id);
        let Some(index) = index else {
            state.start_failures += 1;
            return Err(AcquisitionError::NotFound(constraints.device_id.to_string()));
        };

        let device = &mut state.devices[index];
        let fail = match device.spec.start_behavior {
            StartBehavior::Succeed => false,
            StartBehavior::Fail => true,
            StartBehavior::FailTimes(_) => {
                if device.remaining_failures > 0 {
                    device.remaining_failures -= 1;
                    true
                } else {
                    false
                }
            }
        };
        let stream = PreviewStream {
            device_id: device.spec.id.clone(),
            resolution: constraints.resolution,
            facing: device.spec.facing,
        };
        if fail {
            state.start_failures += 1;
            debug!(constraints = %constraints, "Virtual acquisition failed");
            return Err(AcquisitionError::Busy);
        }
        state.live_streams += 1;
        state.max_live_streams = state.max_live_streams.max(state.live_streams);
        state.events.push(HubEvent::StreamStarted(stream.device_id.clone()));
        debug!(constraints = %constraints, "Virtual stream started");
        Ok(stream)
    }

    fn stop(&self) {
        let mut state = self.inner.lock().unwrap();
        if state.live_streams == 0 {
            return;
        }
        state.live_streams -= 1;
        state.events.push(HubEvent::StreamStopped);
        debug!("Virtual stream stopped");
    }
}

impl SuspensionOracle for VirtualDeviceHub {
    fn is_suspended(&self) -> bool {
        self.inner.lock().unwrap().is_suspended()
    }
}

impl Notifier for VirtualDeviceHub {
    fn announce_device_switch(&self, label: &str) {
        let mut state = self.inner.lock().unwrap();
        state.events.push(HubEvent::Announced(label.to_string()));
    }

    fn warn_no_camera(&self) {
        let mut state = self.inner.lock().unwrap();
        state.warning_visible = true;
        state.events.push(HubEvent::Warned);
    }

    fn clear_no_camera(&self) {
        let mut state = self.inner.lock().unwrap();
        if state.warning_visible {
            state.warning_visible = false;
            state.events.push(HubEvent::WarningCleared);
        }
    }
}
