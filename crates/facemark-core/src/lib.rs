//! facemark-core — Geometry and image-transform pipeline for face overlays.
//!
//! Normalizes image orientation, resamples to a bounded size, maps detector
//! boxes into letterboxed display coordinates, and crops face thumbnails.

pub mod buffer;
pub mod crop;
pub mod detector;
pub mod mapper;
pub mod orientation;
pub mod overlay;
pub mod resample;
pub mod source;
pub mod types;

pub use buffer::{ColorSpace, DecodeError, PixelBuffer, PixelFormat};
pub use crop::{crop_face, CropError, CropOutOfBounds, CropRegion, FaceCrop};
pub use detector::{DetectionFailed, FaceDetector, FixedDetector};
pub use mapper::{map_box, map_boxes};
pub use orientation::{normalize, normalize_buffer, OrientationTag};
pub use overlay::{render, Overlay, OverlayStyle, RectPrimitive};
pub use resample::{resample, ResampleError};
pub use source::{FileSource, ImageSource, RawPixels, SourceImage};
pub use types::{DisplayFrame, FrameError, MappedRect, NormalizedBox, ViewRect};
