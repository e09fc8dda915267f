// Full-screen capture through xcap.
use image::RgbaImage;
use xcap::Monitor;

use crate::errors::{RelayError, RelayResult};

/// Source of full-screen frames for template matching.
pub trait Screen {
    fn capture(&self) -> RelayResult<RgbaImage>;
}

/// Captures the primary monitor, or the first one when none is flagged primary.
pub struct PrimaryScreen;

impl Screen for PrimaryScreen {
    fn capture(&self) -> RelayResult<RgbaImage> {
        let monitors = Monitor::all()
            .map_err(|e| RelayError::Perception(format!("enumerate monitors: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| RelayError::Perception("no monitor found".into()))?;

        let frame = monitor
            .capture_image()
            .map_err(|e| RelayError::Perception(format!("capture: {e}")))?;
        tracing::trace!(width = frame.width(), height = frame.height(), "screen captured");
        Ok(frame)
    }
}
