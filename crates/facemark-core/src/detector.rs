//! Face detector boundary.
//!
//! The detection algorithm is external. Implementations receive an upright
//! pixel buffer and report boxes in normalized, bottom-left-origin
//! coordinates; they are called from a dedicated worker thread.

use crate::buffer::PixelBuffer;
use crate::types::NormalizedBox;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("face detection failed: {0}")]
pub struct DetectionFailed(pub String);

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in an upright buffer.
    fn detect(&self, image: &PixelBuffer) -> Result<Vec<NormalizedBox>, DetectionFailed>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&self, image: &PixelBuffer) -> Result<Vec<NormalizedBox>, DetectionFailed> {
        (**self).detect(image)
    }
}

/// Replays a fixed set of boxes for every image, e.g. detector output saved
/// to disk by another tool.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    boxes: Vec<NormalizedBox>,
}

impl FixedDetector {
    pub fn new(boxes: Vec<NormalizedBox>) -> Self {
        Self { boxes }
    }
}

impl FaceDetector for FixedDetector {
    fn detect(&self, image: &PixelBuffer) -> Result<Vec<NormalizedBox>, DetectionFailed> {
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            faces = self.boxes.len(),
            "replaying fixed detections"
        );
        Ok(self.boxes.clone())
    }
}
