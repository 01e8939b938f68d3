//! Device-pixel to host-DIP conversion.
//!
//! Points returned by the decision service live in the pixel space of the
//! image it was shown. That image may already be a downscaled copy of the
//! capture, so the divisor is the display scale factor times the resize
//! factor of that axis, all read from the [`ScreenshotContext`] of the
//! current task.

use crate::{
    error::{AgentError, Result},
    types::{Point, ScreenshotContext},
};

/// Converts uploaded-image pixels into host DIP for one screenshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateResolver {
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateResolver {
    /// `scale` is uploaded-image pixels per DIP on both axes. Must be finite
    /// and positive.
    pub fn new(scale: f64) -> Result<Self> {
        Self::per_axis(scale, scale)
    }

    pub fn per_axis(scale_x: f64, scale_y: f64) -> Result<Self> {
        for scale in [scale_x, scale_y] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(AgentError::InvalidScale(scale));
            }
        }
        Ok(Self { scale_x, scale_y })
    }

    pub fn for_screenshot(shot: &ScreenshotContext) -> Result<Self> {
        let (x, y) = shot.effective_scale();
        Self::per_axis(x, y)
    }

    pub fn to_host_dip(&self, device: Point) -> Point {
        Point::new(
            (device.x / self.scale_x).round(),
            (device.y / self.scale_y).round(),
        )
    }
}

/// One-shot form of [`CoordinateResolver::to_host_dip`].
pub fn to_host_dip(device: Point, scale: f64) -> Result<Point> {
    Ok(CoordinateResolver::new(scale)?.to_host_dip(device))
}
