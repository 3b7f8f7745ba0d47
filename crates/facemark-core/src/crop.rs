//! Face thumbnails cropped from the full-resolution upright image.
//!
//! Works in the image's own pixel space, not the letterboxed display frame,
//! so the mapping differs from [`crate::mapper`]: there is no content offset
//! and the scale is the source resolution.

use crate::buffer::PixelBuffer;
use crate::types::NormalizedBox;
use serde::Serialize;
use thiserror::Error;

/// Crop rectangle as computed from a box, edges rounded, before clamping.
/// Edges may lie outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestedRegion {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// Crop region inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The requested rectangle extended past the source and was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropOutOfBounds {
    pub requested: RequestedRegion,
    pub clamped: CropRegion,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("crop region {requested:?} does not overlap the {width}x{height} image")]
    EmptyRegion {
        requested: RequestedRegion,
        width: u32,
        height: u32,
    },
}

/// A cropped face and where it came from.
#[derive(Debug, Clone)]
pub struct FaceCrop {
    pub buffer: PixelBuffer,
    pub region: CropRegion,
    /// Set when the detector box reached past the image and was clamped.
    pub out_of_bounds: Option<CropOutOfBounds>,
}

/// Pixel rectangle of `bbox` in a `width` × `height` image, edges rounded.
///
/// `x·W`, `(1 − y)·H − h·H`, `w·W`, `h·H`.
pub fn requested_region(bbox: &NormalizedBox, width: u32, height: u32) -> RequestedRegion {
    let (w, h) = (width as f32, height as f32);
    let rect_x = bbox.x * w;
    let rect_y = (1.0 - bbox.y) * h - bbox.height * h;
    let rect_w = bbox.width * w;
    let rect_h = bbox.height * h;

    RequestedRegion {
        left: rect_x.round() as i64,
        top: rect_y.round() as i64,
        right: (rect_x + rect_w).round() as i64,
        bottom: (rect_y + rect_h).round() as i64,
    }
}

/// Copy the pixels inside `bbox` out of `image` into a new buffer.
///
/// Rectangles reaching past the image are clamped to it rather than
/// rejected; only a region left empty after clamping is an error.
pub fn crop_face(image: &PixelBuffer, bbox: &NormalizedBox) -> Result<FaceCrop, CropError> {
    let (img_w, img_h) = image.dimensions();
    let requested = requested_region(bbox, img_w, img_h);

    let left = requested.left.clamp(0, img_w as i64) as u32;
    let right = requested.right.clamp(0, img_w as i64) as u32;
    let top = requested.top.clamp(0, img_h as i64) as u32;
    let bottom = requested.bottom.clamp(0, img_h as i64) as u32;

    if right <= left || bottom <= top {
        return Err(CropError::EmptyRegion {
            requested,
            width: img_w,
            height: img_h,
        });
    }

    let region = CropRegion {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    };

    let in_bounds = requested.left >= 0
        && requested.top >= 0
        && requested.right <= img_w as i64
        && requested.bottom <= img_h as i64;
    let out_of_bounds = if in_bounds {
        None
    } else {
        tracing::debug!(?requested, clamped = ?region, "crop rectangle clamped to image");
        Some(CropOutOfBounds {
            requested,
            clamped: region,
        })
    };

    let bpp = image.format().bytes_per_pixel();
    let (start, end) = (left as usize * bpp, right as usize * bpp);
    let mut data = Vec::with_capacity((end - start) * region.height as usize);
    for y in top..bottom {
        data.extend_from_slice(&image.row(y)[start..end]);
    }

    let buffer = PixelBuffer::assemble(
        region.width,
        region.height,
        image.format(),
        image.color_space(),
        data,
    );

    Ok(FaceCrop {
        buffer,
        region,
        out_of_bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    /// Gray image where each pixel stores `(x + y) % 256`.
    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x + y) % 256) as u8))
            .collect();
        PixelBuffer::packed(width, height, PixelFormat::Gray8, data).unwrap()
    }

    #[test]
    fn test_centered_quarter_box() {
        let image = gradient(400, 400);
        let crop = crop_face(&image, &NormalizedBox::new(0.25, 0.25, 0.5, 0.5)).unwrap();
        assert_eq!(
            crop.region,
            CropRegion {
                x: 100,
                y: 100,
                width: 200,
                height: 200
            }
        );
        assert_eq!(crop.buffer.dimensions(), (200, 200));
        assert!(crop.out_of_bounds.is_none());
        assert_eq!(crop.buffer.pixel_rgba(0, 0)[0], 200);
    }

    #[test]
    fn test_y_flip_uses_bottom_left_origin() {
        let image = gradient(100, 200);
        // Bottom quarter of the image.
        let crop = crop_face(&image, &NormalizedBox::new(0.0, 0.0, 1.0, 0.25)).unwrap();
        assert_eq!(crop.region.y, 150);
        assert_eq!(crop.region.height, 50);

        // Top quarter.
        let crop = crop_face(&image, &NormalizedBox::new(0.0, 0.75, 1.0, 0.25)).unwrap();
        assert_eq!(crop.region.y, 0);
        assert_eq!(crop.region.height, 50);
    }

    #[test]
    fn test_whole_image() {
        let image = gradient(31, 17);
        let crop = crop_face(&image, &NormalizedBox::unit()).unwrap();
        assert_eq!(crop.buffer, image);
    }

    #[test]
    fn test_out_of_range_box_is_clamped() {
        let image = gradient(100, 100);
        let crop = crop_face(&image, &NormalizedBox::new(0.8, -0.1, 0.4, 0.3)).unwrap();
        let oob = crop.out_of_bounds.expect("clamping should be reported");
        assert_eq!(oob.requested.right, 120);
        assert_eq!(oob.requested.bottom, 110);
        assert_eq!(
            crop.region,
            CropRegion {
                x: 80,
                y: 80,
                width: 20,
                height: 20
            }
        );
        assert_eq!(crop.buffer.dimensions(), (20, 20));
    }

    #[test]
    fn test_box_entirely_outside_fails() {
        let image = gradient(50, 50);
        let result = crop_face(&image, &NormalizedBox::new(1.2, 0.2, 0.3, 0.3));
        assert!(matches!(result, Err(CropError::EmptyRegion { .. })));
    }

    #[test]
    fn test_crop_keeps_format() {
        let data = vec![9u8; 8 * 8 * 4];
        let image = PixelBuffer::packed(8, 8, PixelFormat::Rgba8, data).unwrap();
        let crop = crop_face(&image, &NormalizedBox::new(0.5, 0.5, 0.5, 0.5)).unwrap();
        assert_eq!(crop.buffer.format(), PixelFormat::Rgba8);
        assert_eq!(crop.region, CropRegion { x: 4, y: 0, width: 4, height: 4 });
    }

    #[test]
    fn test_crop_reads_padded_rows() {
        let data = vec![1, 2, 3, 0, 4, 5, 6, 0];
        let image = PixelBuffer::new(3, 2, PixelFormat::Gray8, 4, data).unwrap();
        let crop = crop_face(&image, &NormalizedBox::new(0.0, 0.0, 1.0, 0.5)).unwrap();
        assert_eq!(crop.buffer.data(), &[4, 5, 6]);
    }
}
