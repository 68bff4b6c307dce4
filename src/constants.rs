// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Delay before re-running a failed configuration pass.
///
/// Fixed, not exponential: the usual failure causes (device briefly busy,
/// app suspended) clear within a frame or two.
pub const RETRY_START_DELAY: Duration = Duration::from_millis(100);

/// Preview resolutions offered by the virtual device hub, largest first
pub const VIRTUAL_PREVIEW_RESOLUTIONS: [(u32, u32); 4] =
    [(1920, 1080), (1280, 720), (640, 480), (320, 240)];

/// Default framerate for virtual device streams
pub const VIRTUAL_DEFAULT_FPS: u32 = 30;
