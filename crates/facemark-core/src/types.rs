use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Face bounding box as reported by a detector.
///
/// All fields are fractions of the image it was computed against, with the
/// origin at the image's bottom-left corner: `y` names the box's bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole image.
    pub const fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// True when the box lies entirely inside the unit square.
    pub fn is_within_unit(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0
            && self.y + self.height <= 1.0
    }
}

/// Rectangle in pixels, origin top-left, relative to a [`DisplayFrame`]'s
/// coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MappedRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// On-screen bounds of the view that hosts the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("view has no area ({width}x{height})")]
    EmptyView { width: f32, height: f32 },
    #[error("image has no area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("content {content_width}x{content_height} exceeds frame {frame_width}x{frame_height}")]
    ContentExceedsFrame {
        content_width: f32,
        content_height: f32,
        frame_width: f32,
        frame_height: f32,
    },
}

/// Where displayed image content sits inside a view.
///
/// The content never exceeds the frame and is centered in it, so the
/// letterbox margins are equal on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    frame: ViewRect,
    content_width: f32,
    content_height: f32,
}

impl DisplayFrame {
    pub fn new(frame: ViewRect, content_width: f32, content_height: f32) -> Result<Self, FrameError> {
        if !(frame.width > 0.0 && frame.height > 0.0) {
            return Err(FrameError::EmptyView {
                width: frame.width,
                height: frame.height,
            });
        }
        // NaN fails `contains`.
        if !(0.0..=frame.width).contains(&content_width)
            || !(0.0..=frame.height).contains(&content_height)
        {
            return Err(FrameError::ContentExceedsFrame {
                content_width,
                content_height,
                frame_width: frame.width,
                frame_height: frame.height,
            });
        }
        Ok(Self {
            frame,
            content_width,
            content_height,
        })
    }

    /// Aspect-fit an image of `image_width` × `image_height` pixels into `view`.
    ///
    /// The image is scaled by the stricter of the two axis ratios, so one
    /// axis fills the view and the other is letterboxed.
    pub fn aspect_fit(view: ViewRect, image_width: u32, image_height: u32) -> Result<Self, FrameError> {
        if !(view.width > 0.0 && view.height > 0.0) {
            return Err(FrameError::EmptyView {
                width: view.width,
                height: view.height,
            });
        }
        let width_ratio = image_width as f32 / view.width;
        let height_ratio = image_height as f32 / view.height;
        let scale_down = width_ratio.max(height_ratio);
        if !(scale_down.is_finite() && scale_down > 0.0) {
            return Err(FrameError::EmptyImage {
                width: image_width,
                height: image_height,
            });
        }

        // Float division can overshoot the view by an ulp on the filled axis.
        let content_width = (image_width as f32 / scale_down).min(view.width);
        let content_height = (image_height as f32 / scale_down).min(view.height);

        Self::new(view, content_width, content_height)
    }

    pub fn frame(&self) -> ViewRect {
        self.frame
    }

    pub fn content_width(&self) -> f32 {
        self.content_width
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    /// Horizontal and vertical letterbox margins.
    pub fn margins(&self) -> (f32, f32) {
        (
            (self.frame.width - self.content_width) / 2.0,
            (self.frame.height - self.content_height) / 2.0,
        )
    }

    /// Top-left corner of the content, in the frame's coordinate space.
    pub fn content_origin(&self) -> (f32, f32) {
        let (margin_x, margin_y) = self.margins();
        (self.frame.x + margin_x, self.frame.y + margin_y)
    }

    /// The sub-region actually covered by image pixels.
    pub fn content_rect(&self) -> MappedRect {
        let (x, y) = self.content_origin();
        MappedRect {
            x,
            y,
            width: self.content_width,
            height: self.content_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_box_within_unit() {
        assert!(NormalizedBox::unit().is_within_unit());
        assert!(!NormalizedBox::new(0.8, 0.1, 0.3, 0.2).is_within_unit());
        assert!(!NormalizedBox::new(-0.1, 0.1, 0.3, 0.2).is_within_unit());
    }

    #[test]
    fn test_aspect_fit_landscape_letterboxes_vertically() {
        let view = ViewRect::new(0.0, 0.0, 400.0, 400.0);
        let frame = DisplayFrame::aspect_fit(view, 800, 400).unwrap();
        assert_eq!(frame.content_width(), 400.0);
        assert_eq!(frame.content_height(), 200.0);
        assert_eq!(frame.margins(), (0.0, 100.0));
        assert_eq!(frame.content_origin(), (0.0, 100.0));
    }

    #[test]
    fn test_aspect_fit_portrait_letterboxes_horizontally() {
        let view = ViewRect::new(10.0, 20.0, 300.0, 300.0);
        let frame = DisplayFrame::aspect_fit(view, 100, 300).unwrap();
        assert_eq!(frame.content_width(), 100.0);
        assert_eq!(frame.content_height(), 300.0);
        assert_eq!(frame.content_origin(), (110.0, 20.0));
    }

    #[test]
    fn test_aspect_fit_scales_small_image_up() {
        let view = ViewRect::new(0.0, 0.0, 500.0, 250.0);
        let frame = DisplayFrame::aspect_fit(view, 50, 50).unwrap();
        assert_eq!(frame.content_width(), 250.0);
        assert_eq!(frame.content_height(), 250.0);
        assert_eq!(frame.margins(), (125.0, 0.0));
    }

    #[test]
    fn test_aspect_fit_empty_view() {
        let view = ViewRect::new(0.0, 0.0, 0.0, 100.0);
        assert!(matches!(
            DisplayFrame::aspect_fit(view, 10, 10),
            Err(FrameError::EmptyView { .. })
        ));
    }

    #[test]
    fn test_nan_content_rejected() {
        let view = ViewRect::new(0.0, 0.0, 100.0, 100.0);
        assert!(matches!(
            DisplayFrame::new(view, f32::NAN, 50.0),
            Err(FrameError::ContentExceedsFrame { .. })
        ));
        assert!(matches!(
            DisplayFrame::aspect_fit(view, 0, 0),
            Err(FrameError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_content_larger_than_frame_rejected() {
        let view = ViewRect::new(0.0, 0.0, 100.0, 100.0);
        assert!(matches!(
            DisplayFrame::new(view, 120.0, 50.0),
            Err(FrameError::ContentExceedsFrame { .. })
        ));
    }

    #[test]
    fn test_content_rect_margins_are_symmetric() {
        let view = ViewRect::new(0.0, 64.0, 375.0, 500.0);
        let frame = DisplayFrame::aspect_fit(view, 1000, 600).unwrap();
        let rect = frame.content_rect();
        let left = rect.x - view.x;
        let right = (view.x + view.width) - rect.right();
        let top = rect.y - view.y;
        let bottom = (view.y + view.height) - rect.bottom();
        assert!((left - right).abs() < 1e-3, "left={left} right={right}");
        assert!((top - bottom).abs() < 1e-3, "top={top} bottom={bottom}");
    }
}
