//! Drawable overlay primitives for mapped face boxes.

use crate::types::MappedRect;
use serde::{Deserialize, Serialize};

/// Stroke appearance for face rectangles and the opacity of the layer that
/// holds them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub stroke_width: f32,
    /// Straight RGBA.
    pub stroke_color: [u8; 4],
    /// Opacity of the whole overlay layer, 0.0–1.0.
    pub opacity: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            stroke_color: [255, 255, 0, 255],
            opacity: 0.5,
        }
    }
}

/// One stroked, unfilled rectangle in display-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectPrimitive {
    pub rect: MappedRect,
    pub stroke_width: f32,
    pub stroke_color: [u8; 4],
    /// Always `None`: face boxes are outlines only.
    pub fill: Option<[u8; 4]>,
}

/// What the host should composite for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    Faces {
        primitives: Vec<RectPrimitive>,
        opacity: f32,
    },
    /// Detection finished with nothing to draw. A normal outcome the host
    /// shows as a "no faces found" notice.
    NoFacesDetected,
}

impl Overlay {
    pub fn primitives(&self) -> &[RectPrimitive] {
        match self {
            Overlay::Faces { primitives, .. } => primitives,
            Overlay::NoFacesDetected => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Overlay::NoFacesDetected)
    }
}

/// Build one primitive per rect, or the no-faces signal for an empty list.
pub fn render(rects: &[MappedRect], style: &OverlayStyle) -> Overlay {
    if rects.is_empty() {
        return Overlay::NoFacesDetected;
    }
    let primitives = rects
        .iter()
        .map(|&rect| RectPrimitive {
            rect,
            stroke_width: style.stroke_width,
            stroke_color: style.stroke_color,
            fill: None,
        })
        .collect();
    Overlay::Faces {
        primitives,
        opacity: style.opacity,
    }
}
