// SPDX-License-Identifier: GPL-3.0-only

//! Stream configuration abstraction
//!
//! This module owns the lifecycle of "is there currently a working camera
//! preview". The controller negotiates a device/mode/resolution combination
//! against live hardware state through a set of collaborator traits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   UI / App shell     │
//! └──────────┬───────────┘
//!            │ request_configuration(mode)
//!            ▼
//! ┌──────────────────────┐
//! │   StreamController   │  ← Serializes passes, retry timer, suspension
//! └──────────┬───────────┘
//!            │
//!    ┌───────┼──────────┬─────────────┬────────────┐
//!    ▼       ▼          ▼             ▼            ▼
//! Device  Mode       Preview      Suspension    Notifier
//! Enum.   Negotiator Sink         Oracle
//! ```
//!
//! Candidate iteration is strictly sequential: acquiring a camera stream is
//! an exclusive-hardware operation, so candidates are never tried
//! concurrently.

pub mod controller;
pub mod types;

pub use controller::StreamController;
pub use types::*;

use crate::errors::{AcquisitionError, CandidateError, ControlError, EnumerationError};
use async_trait::async_trait;
use std::sync::Arc;

/// Lists candidate devices and per-device capabilities
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// Candidate device ids in priority order.
    ///
    /// The order is authoritative: the controller tries devices strictly in
    /// this order and the first working one wins.
    async fn list_device_ids(&self) -> Result<Vec<DeviceId>, EnumerationError>;

    /// Resolution capabilities of a device.
    ///
    /// Fails with `DeviceUnavailable` if the device vanished since
    /// enumeration.
    async fn preview_resolutions(
        &self,
        device: &DeviceId,
    ) -> Result<PreviewResolutions, EnumerationError>;

    /// Human-readable label for a device, used for switch announcements
    async fn device_label(&self, device: &DeviceId) -> Option<String>;

    /// Richer per-device control API, when the platform provides one.
    ///
    /// `None` is not a failure: the controller falls back to the legacy
    /// candidate source scoped only by mode and makes no control calls.
    async fn device_control(&self) -> Option<Arc<dyn DeviceControl>>;
}

/// Per-device capture controls, only present on platforms exposing them
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Pin the device framerate range to match the preview constraints
    async fn set_fps_range(
        &self,
        device: &DeviceId,
        constraints: &StreamConstraints,
    ) -> Result<(), ControlError>;

    /// Tell the device what the stream will be used for
    async fn set_capture_intent(
        &self,
        device: &DeviceId,
        intent: CaptureIntent,
    ) -> Result<(), ControlError>;
}

/// Produces the ordered candidate sets for a capture mode and applies
/// mode-derived state once a stream is up
#[async_trait]
pub trait ModeNegotiator: Send + Sync {
    /// Capture modes the device can serve
    async fn supported_modes(&self, device: &DeviceId) -> Result<Vec<Mode>, EnumerationError>;

    /// Ordered mode chain to try for a requested mode.
    ///
    /// Defaults to the mode's built-in fallback chain.
    fn mode_candidates(&self, requested: Mode) -> Vec<Mode> {
        requested.candidate_chain()
    }

    /// Ordered (capture resolution, preview constraints) candidates for a
    /// device, scoped by its reported capabilities
    async fn resolution_candidates(
        &self,
        mode: Mode,
        device: &DeviceId,
        resolutions: &PreviewResolutions,
    ) -> Result<Vec<ResolutionCandidate>, EnumerationError>;

    /// Legacy candidate source, scoped only by mode.
    ///
    /// Used when no per-device control API is available.
    async fn resolution_candidates_legacy(
        &self,
        mode: Mode,
        device: &DeviceId,
    ) -> Result<Vec<ResolutionCandidate>, EnumerationError>;

    /// Capture intent to request for a mode
    fn capture_intent(&self, mode: Mode) -> CaptureIntent {
        mode.capture_intent()
    }

    /// Bind the freshly acquired stream to the mode: update mode-selection
    /// state and capture-resolution-dependent state.
    ///
    /// A failure here fails the candidate, not the pass.
    async fn activate(
        &self,
        mode: Mode,
        stream: &PreviewStream,
        device: &DeviceId,
        capture: Resolution,
    ) -> Result<(), CandidateError>;

    /// Whether a photo/video capture is currently in flight
    fn capture_in_progress(&self) -> bool;

    /// Interrupt an in-flight capture before reconfiguration.
    ///
    /// Errors are the implementation's to log; reconfiguration proceeds
    /// regardless.
    async fn interrupt_capture(&self);
}

/// Starts and stops the raw preview stream
#[async_trait]
pub trait PreviewSink: Send + Sync {
    /// Acquire a raw stream for the given constraints.
    ///
    /// There is no per-candidate timeout: a hung acquisition blocks its
    /// candidate until the platform call returns.
    async fn start(&self, constraints: &StreamConstraints) -> Result<PreviewStream, AcquisitionError>;

    /// Stop the running stream. Stopping an already-stopped preview is a
    /// no-op.
    fn stop(&self);
}

/// Reports whether holding a live camera stream is currently disallowed
/// (lock screen, minimized window, explicit suspend, tablet-mode background)
pub trait SuspensionOracle: Send + Sync {
    /// Cheap, synchronous; polled repeatedly within a single pass
    fn is_suspended(&self) -> bool;
}

/// User-visible warnings and announcements
pub trait Notifier: Send + Sync {
    /// Announce that the active camera changed, with its label
    fn announce_device_switch(&self, label: &str);

    /// Surface the "no camera" warning
    fn warn_no_camera(&self);

    /// Dismiss the "no camera" warning after a successful configuration
    fn clear_no_camera(&self);
}
