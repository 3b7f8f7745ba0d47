//! Aspect-preserving downsampling with a Lanczos3 kernel.

use crate::buffer::{DecodeError, PixelBuffer};
use image::imageops::FilterType;
use std::borrow::Cow;
use thiserror::Error;

/// Kernel used for all downsampling. Lanczos3 low-pass filters before
/// decimation, so fine detail does not alias.
const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("target size {width}x{height} has no area")]
    EmptyTarget { width: u32, height: u32 },
    #[error("resampled buffer rejected: {0}")]
    Buffer(#[from] DecodeError),
}

/// Dimensions after fitting the longer side into `bound`, or `None` when the
/// buffer already fits and must be left alone.
///
/// `factor = bound / max(w, h)`; each side is `round(side * factor)`.
pub fn target_dimensions(width: u32, height: u32, bound: u32) -> Option<(u32, u32)> {
    if width <= bound && height <= bound {
        return None;
    }
    let factor = bound as f64 / width.max(height) as f64;
    Some((
        (width as f64 * factor).round() as u32,
        (height as f64 * factor).round() as u32,
    ))
}

/// Scale `buffer` down so its longer side is at most `bound` pixels.
///
/// Never scales up: a buffer that already fits is returned borrowed. Pixel
/// format (including alpha) and color space are preserved.
pub fn resample(buffer: &PixelBuffer, bound: u32) -> Result<Cow<'_, PixelBuffer>, ResampleError> {
    let Some((new_w, new_h)) = target_dimensions(buffer.width(), buffer.height(), bound) else {
        tracing::debug!(
            width = buffer.width(),
            height = buffer.height(),
            bound,
            "buffer within bound, skipping resample"
        );
        return Ok(Cow::Borrowed(buffer));
    };

    if new_w == 0 || new_h == 0 {
        return Err(ResampleError::EmptyTarget {
            width: new_w,
            height: new_h,
        });
    }

    tracing::debug!(
        src_width = buffer.width(),
        src_height = buffer.height(),
        dst_width = new_w,
        dst_height = new_h,
        "resampling"
    );

    let resized = buffer.to_dynamic().resize_exact(new_w, new_h, RESAMPLE_FILTER);
    let out = PixelBuffer::from_dynamic(resized)?.with_color_space(buffer.color_space());
    Ok(Cow::Owned(out))
}
