//! Screenshot preparation before upload.

use std::io::Cursor;

use {
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    image::{ImageFormat, imageops::FilterType},
    tracing::debug,
};

use crate::{
    error::{AgentError, Result},
    types::ScreenshotContext,
};

/// Encode the screenshot as a `data:` URI so the service knows the image
/// format without guessing.
pub fn data_uri(shot: &ScreenshotContext) -> String {
    let mime = image::guess_format(&shot.image_data)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/png");
    format!("data:{mime};base64,{}", BASE64.encode(&shot.image_data))
}

/// Downscale the screenshot so neither side exceeds `max_dimension`.
///
/// Each side is rounded to whole pixels, and the factor actually applied to
/// that side is folded into `resize_x`/`resize_y`, which the coordinate
/// resolver inverts. `max_dimension == 0` leaves the screenshot untouched.
pub fn prepare_for_upload(
    shot: ScreenshotContext,
    max_dimension: u32,
) -> Result<ScreenshotContext> {
    let longest = shot.device_width.max(shot.device_height);
    if max_dimension == 0 || longest <= max_dimension {
        return Ok(shot);
    }

    let factor = f64::from(max_dimension) / f64::from(longest);
    let width = ((f64::from(shot.device_width) * factor).round() as u32).max(1);
    let height = ((f64::from(shot.device_height) * factor).round() as u32).max(1);

    let decoded = image::load_from_memory(&shot.image_data)
        .map_err(|e| AgentError::Capture(format!("failed to decode screenshot: {e}")))?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| AgentError::Capture(format!("failed to encode screenshot: {e}")))?;

    debug!(
        from_width = shot.device_width,
        from_height = shot.device_height,
        width,
        height,
        factor,
        "downscaled screenshot for upload"
    );

    Ok(ScreenshotContext {
        image_data: png,
        device_width: width,
        device_height: height,
        scale_factor: shot.scale_factor,
        resize_x: shot.resize_x * f64::from(width) / f64::from(shot.device_width),
        resize_y: shot.resize_y * f64::from(height) / f64::from(shot.device_height),
    })
}
