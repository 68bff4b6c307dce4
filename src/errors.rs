// SPDX-License-Identifier: GPL-3.0-only

//! Error types for stream configuration
//!
//! Failures inside a configuration pass never escape
//! `StreamController::request_configuration`; they are caught per candidate
//! and only decide whether the pass moves on to the next candidate.

use std::fmt;

/// Device enumeration and capability inspection errors
#[derive(Debug, Clone)]
pub enum EnumerationError {
    /// The device vanished between enumeration and inspection
    DeviceUnavailable(String),
    /// Underlying platform call failed
    Backend(String),
}

impl fmt::Display for EnumerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumerationError::DeviceUnavailable(id) => write!(f, "Device unavailable: {}", id),
            EnumerationError::Backend(msg) => write!(f, "Enumeration failed: {}", msg),
        }
    }
}

/// Per-device control API errors (fps range, capture intent)
#[derive(Debug, Clone)]
pub enum ControlError {
    /// Device disconnected while applying controls
    Disconnected,
    /// The device rejected the requested control value
    Rejected(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Disconnected => write!(f, "Device disconnected"),
            ControlError::Rejected(msg) => write!(f, "Control rejected: {}", msg),
        }
    }
}

/// Raw stream acquisition errors from the preview sink
#[derive(Debug, Clone)]
pub enum AcquisitionError {
    /// Device is held by another client
    Busy,
    /// Device not found
    NotFound(String),
    /// Camera access not allowed
    PermissionDenied,
    /// No stream satisfies the requested constraints
    Overconstrained(String),
    /// Other backend failure
    Backend(String),
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::Busy => write!(f, "Device is busy"),
            AcquisitionError::NotFound(id) => write!(f, "Device not found: {}", id),
            AcquisitionError::PermissionDenied => write!(f, "Camera access denied"),
            AcquisitionError::Overconstrained(msg) => {
                write!(f, "Constraints not satisfiable: {}", msg)
            }
            AcquisitionError::Backend(msg) => write!(f, "Stream acquisition failed: {}", msg),
        }
    }
}

/// Failure of a single (device, resolution, constraints) candidate
///
/// Recovered locally: the candidate is logged and skipped, the pass
/// continues with the next one.
#[derive(Debug, Clone)]
pub enum CandidateError {
    /// Per-device control call failed
    Control(ControlError),
    /// Stream acquisition failed
    Acquisition(AcquisitionError),
    /// Capability inspection failed mid-candidate
    Enumeration(EnumerationError),
    /// Updating mode/UI-derived state against the new stream failed
    Activation(String),
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateError::Control(e) => write!(f, "Control error: {}", e),
            CandidateError::Acquisition(e) => write!(f, "Acquisition error: {}", e),
            CandidateError::Enumeration(e) => write!(f, "Enumeration error: {}", e),
            CandidateError::Activation(msg) => write!(f, "Activation error: {}", msg),
        }
    }
}

impl std::error::Error for EnumerationError {}
impl std::error::Error for ControlError {}
impl std::error::Error for AcquisitionError {}
impl std::error::Error for CandidateError {}

impl From<ControlError> for CandidateError {
    fn from(err: ControlError) -> Self {
        CandidateError::Control(err)
    }
}

impl From<AcquisitionError> for CandidateError {
    fn from(err: AcquisitionError) -> Self {
        CandidateError::Acquisition(err)
    }
}

impl From<EnumerationError> for CandidateError {
    fn from(err: EnumerationError) -> Self {
        CandidateError::Enumeration(err)
    }
}
