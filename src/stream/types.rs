// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the stream configuration controller

//! Shared types for stream configuration

use serde::{Deserialize, Serialize};

/// Identifier of a camera device as reported by the platform.
///
/// Opaque to the controller; only compared for equality and echoed back to
/// the collaborators that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Capture mode the controller configures the stream for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Still photo capture
    #[default]
    Photo,
    /// Video recording
    Video,
    /// Square-cropped photo capture
    Square,
    /// Portrait (bokeh) photo capture
    Portrait,
}

impl Mode {
    /// All modes in UI ordering
    pub const ALL: [Mode; 4] = [Mode::Photo, Mode::Video, Mode::Square, Mode::Portrait];

    /// Mode to fall back to when a device cannot serve this one.
    ///
    /// The specialized photo modes degrade to plain photo capture; photo and
    /// video have no substitute.
    pub fn fallback(&self) -> Option<Mode> {
        match self {
            Mode::Square | Mode::Portrait => Some(Mode::Photo),
            Mode::Photo | Mode::Video => None,
        }
    }

    /// Ordered candidate chain starting from this mode, following fallbacks
    pub fn candidate_chain(&self) -> Vec<Mode> {
        let mut chain = vec![*self];
        let mut current = *self;
        while let Some(next) = current.fallback() {
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Photo => "Photo",
            Mode::Video => "Video",
            Mode::Square => "Square",
            Mode::Portrait => "Portrait",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(Mode::Photo),
            "video" => Ok(Mode::Video),
            "square" => Ok(Mode::Square),
            "portrait" => Ok(Mode::Portrait),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Which way the active camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    /// Front camera (towards the user)
    User,
    /// Back camera (away from the user)
    Environment,
    /// External camera (USB webcam etc.)
    External,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::External => write!(f, "external"),
        }
    }
}

/// Capture intent forwarded to the per-device control API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureIntent {
    /// Optimize the pipeline for still capture
    StillCapture,
    /// Optimize the pipeline for video recording
    VideoRecord,
}

impl Mode {
    /// Default capture intent for this mode
    pub fn capture_intent(&self) -> CaptureIntent {
        match self {
            Mode::Video => CaptureIntent::VideoRecord,
            Mode::Photo | Mode::Square | Mode::Portrait => CaptureIntent::StillCapture,
        }
    }
}

/// A capture or preview resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, used for ordering candidates by size
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width-to-height ratio
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Framerate as a fraction (numerator/denominator)
///
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Rounded integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Constraints handed to the preview sink to open a raw stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Device to open the stream on
    pub device_id: DeviceId,
    /// Requested preview resolution
    pub resolution: Resolution,
    /// Requested framerate, if the candidate pins one
    pub framerate: Option<Framerate>,
}

impl std::fmt::Display for StreamConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.framerate {
            Some(fps) => write!(f, "{} {}@{}fps", self.device_id, self.resolution, fps),
            None => write!(f, "{} {}", self.device_id, self.resolution),
        }
    }
}

/// Per-device resolution lists, split by capture kind
#[derive(Debug, Clone, Default)]
pub struct PreviewResolutions {
    /// Resolutions usable for photo capture
    pub photo: Vec<Resolution>,
    /// Resolutions usable for video capture
    pub video: Vec<Resolution>,
}

impl PreviewResolutions {
    /// Resolution list for the given mode
    pub fn for_mode(&self, mode: Mode) -> &[Resolution] {
        match mode {
            Mode::Video => &self.video,
            Mode::Photo | Mode::Square | Mode::Portrait => &self.photo,
        }
    }
}

/// One capture resolution with its ordered preview-constraints candidates
///
/// Ordering inside `previews` is authoritative: the first constraints that
/// yield a working stream win for this capture resolution.
#[derive(Debug, Clone)]
pub struct ResolutionCandidate {
    /// Capture resolution this candidate configures
    pub capture: Resolution,
    /// Preview constraints to try, in priority order
    pub previews: Vec<StreamConstraints>,
}

/// Metadata handle for a running preview stream
///
/// Returned by a successful `PreviewSink::start`. The sink keeps ownership of
/// the underlying stream; this is what the controller needs to update
/// UI-facing derived state.
#[derive(Debug, Clone)]
pub struct PreviewStream {
    /// Device backing the stream
    pub device_id: DeviceId,
    /// Actual preview resolution the stream opened with
    pub resolution: Resolution,
    /// Facing of the backing camera, when the platform reports it
    pub facing: Option<FacingMode>,
}
