//! Normalized detector boxes → letterboxed display coordinates.

use crate::types::{DisplayFrame, MappedRect, NormalizedBox};

/// Map a detector box into the frame's coordinate space.
///
/// The box's `y` names its bottom edge in a bottom-left-origin unit square;
/// the output rect has a top-left origin. The box is scaled by the frame's
/// content size and shifted by the content origin (frame origin plus
/// letterbox margin). Coordinates are not validated: a box outside the unit
/// square maps outside the content region.
pub fn map_box(bbox: &NormalizedBox, frame: &DisplayFrame) -> MappedRect {
    let content_width = frame.content_width();
    let content_height = frame.content_height();
    let (offset_x, offset_y) = frame.content_origin();

    let top = 1.0 - bbox.y - bbox.height;

    MappedRect {
        x: bbox.x * content_width + offset_x,
        y: top * content_height + offset_y,
        width: bbox.width * content_width,
        height: bbox.height * content_height,
    }
}

pub fn map_boxes(boxes: &[NormalizedBox], frame: &DisplayFrame) -> Vec<MappedRect> {
    boxes.iter().map(|b| map_box(b, frame)).collect()
}
