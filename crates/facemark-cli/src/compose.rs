//! Software compositing of the displayed image and its face overlay onto a
//! view-sized canvas.

use facemark_core::{DisplayFrame, MappedRect, Overlay, PixelBuffer};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const BACKGROUND: Rgba<u8> = Rgba([32, 32, 32, 255]);

/// Draw `display` letterboxed into the frame, then stroke every overlay
/// primitive on top.
///
/// The canvas covers the frame only, so frame-space coordinates are shifted
/// by the frame origin.
pub fn compose(display: &PixelBuffer, frame: &DisplayFrame, overlay: &Overlay) -> RgbaImage {
    let view = frame.frame();
    let canvas_w = (view.width.round() as u32).max(1);
    let canvas_h = (view.height.round() as u32).max(1);
    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, BACKGROUND);

    let content_w = frame.content_width().round() as u32;
    let content_h = frame.content_height().round() as u32;
    if content_w > 0 && content_h > 0 {
        let content = display
            .to_dynamic()
            .resize_exact(content_w, content_h, FilterType::Lanczos3)
            .to_rgba8();
        let (margin_x, margin_y) = frame.margins();
        imageops::overlay(
            &mut canvas,
            &content,
            margin_x.round() as i64,
            margin_y.round() as i64,
        );
    }

    let opacity = match overlay {
        Overlay::Faces { opacity, .. } => *opacity,
        Overlay::NoFacesDetected => return canvas,
    };
    for primitive in overlay.primitives() {
        let local = MappedRect {
            x: primitive.rect.x - view.x,
            y: primitive.rect.y - view.y,
            ..primitive.rect
        };
        let thickness = (primitive.stroke_width.round() as i64).max(1);
        stroke_rect(&mut canvas, &local, thickness, primitive.stroke_color, opacity);
    }

    canvas
}

/// Blend a rectangular outline `thickness` pixels wide, drawn inside the
/// rect's edges. Each pixel is blended once, so corners are not darker.
fn stroke_rect(img: &mut RgbaImage, rect: &MappedRect, thickness: i64, color: [u8; 4], opacity: f32) {
    let x0 = rect.x.round() as i64;
    let y0 = rect.y.round() as i64;
    let x1 = rect.right().round() as i64 - 1;
    let y1 = rect.bottom().round() as i64 - 1;
    if x1 < x0 || y1 < y0 {
        return;
    }

    let (img_w, img_h) = img.dimensions();
    let alpha = (color[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);

    for py in y0.max(0)..=y1.min(img_h as i64 - 1) {
        for px in x0.max(0)..=x1.min(img_w as i64 - 1) {
            let on_edge = px - x0 < thickness
                || x1 - px < thickness
                || py - y0 < thickness
                || y1 - py < thickness;
            if on_edge {
                blend_pixel(img, px as u32, py as u32, color, alpha);
            }
        }
    }
}

fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, color: [u8; 4], alpha: f32) {
    let pixel = img.get_pixel_mut(x, y);
    for channel in 0..3 {
        let under = pixel.0[channel] as f32;
        pixel.0[channel] = (under * (1.0 - alpha) + color[channel] as f32 * alpha).round() as u8;
    }
    pixel.0[3] = pixel.0[3].max((alpha * 255.0).round() as u8);
}
