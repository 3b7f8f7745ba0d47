//! The single live image and its asynchronous detection.
//!
//! Presenting an image runs normalize → resample → aspect-fit on the caller's
//! path, then hands the display copy to the detector worker tagged with a
//! fresh [`ImageId`]. Outcomes whose tag does not match the live image are
//! dropped, so a slow detector can never draw boxes over a newer photo.

use crate::config::Config;
use crate::engine::{DetectionOutcome, DetectorHandle};
use facemark_core::{
    crop_face, map_boxes, normalize, render, resample, DecodeError, DetectionFailed,
    DisplayFrame, FaceCrop, FrameError, ImageSource, MappedRect, NormalizedBox, Overlay,
    OverlayStyle, PixelBuffer, ResampleError, SourceImage, ViewRect,
};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Identity of one presented image. Every presentation gets a new id, even
/// for the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("resample failed: {0}")]
    Resample(#[from] ResampleError),
    #[error("cannot place image in view: {0}")]
    Frame(#[from] FrameError),
}

/// The image currently on screen.
#[derive(Debug, Clone)]
pub struct DisplayedImage {
    pub id: ImageId,
    /// Upright, full resolution. Face crops are cut from this.
    pub original: Arc<PixelBuffer>,
    /// Bounded copy that is shown and sent to the detector.
    pub display: Arc<PixelBuffer>,
    pub frame: DisplayFrame,
}

/// One detected face: the raw box, where it is drawn, and its thumbnail.
#[derive(Debug, Clone)]
pub struct FaceThumbnail {
    pub bbox: NormalizedBox,
    pub rect: MappedRect,
    pub crop: FaceCrop,
}

/// Everything the host needs to draw detection results for one image.
#[derive(Debug, Clone)]
pub struct OverlayUpdate {
    pub image: ImageId,
    pub overlay: Overlay,
    pub thumbnails: Vec<FaceThumbnail>,
    /// Set when the detector failed; the overlay is then `NoFacesDetected`.
    pub detection_error: Option<DetectionFailed>,
}

pub struct Session {
    detector: DetectorHandle,
    max_dimension: u32,
    view: ViewRect,
    style: OverlayStyle,
    current: Option<DisplayedImage>,
    pending: Option<JoinHandle<()>>,
    outcomes_tx: mpsc::Sender<DetectionOutcome>,
    outcomes_rx: mpsc::Receiver<DetectionOutcome>,
}

impl Session {
    pub fn new(detector: DetectorHandle, config: &Config) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel(config.detector_queue_depth.max(1));
        Self {
            detector,
            max_dimension: config.max_dimension,
            view: config.view_rect(),
            style: config.overlay_style(),
            current: None,
            pending: None,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn current(&self) -> Option<&DisplayedImage> {
        self.current.as_ref()
    }

    /// Pull one image from `source` and present it.
    pub fn acquire_from<S: ImageSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<&DisplayedImage>, PipelineError> {
        let acquired = source.acquire()?;
        self.present(acquired)
    }

    /// Show a newly acquired image and start detecting faces in it.
    ///
    /// `None` (acquisition cancelled) leaves everything as it was. On error the
    /// previous image stays displayed and its detection keeps running.
    /// Must be called from within a Tokio runtime.
    pub fn present(
        &mut self,
        acquired: Option<SourceImage>,
    ) -> Result<Option<&DisplayedImage>, PipelineError> {
        let Some(source) = acquired else {
            tracing::debug!("acquisition cancelled, keeping current image");
            return Ok(None);
        };

        let prepared = match self.prepare(source) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(error = %err, "image rejected, keeping current image");
                return Err(err);
            }
        };

        self.cancel_pending();
        let id = prepared.id;
        let display = Arc::clone(&prepared.display);
        self.current = Some(prepared);
        self.pending = Some(self.dispatch(id, display));

        Ok(self.current.as_ref())
    }

    /// Drop the current image and cancel its detection.
    pub fn clear(&mut self) {
        self.cancel_pending();
        self.current = None;
    }

    /// Wait for the next detection result that belongs to the live image.
    ///
    /// Stale results are skipped. Pends until a matching result arrives, which
    /// may be never if the detector hangs.
    pub async fn next_update(&mut self) -> Option<OverlayUpdate> {
        while let Some(outcome) = self.outcomes_rx.recv().await {
            if let Some(update) = self.accept(outcome) {
                self.pending = None;
                return Some(update);
            }
        }
        None
    }

    /// Turn a detection outcome into an overlay update, or `None` if it was
    /// issued for an image that is no longer displayed.
    pub fn accept(&self, outcome: DetectionOutcome) -> Option<OverlayUpdate> {
        let Some(current) = self.current.as_ref().filter(|c| c.id == outcome.image) else {
            tracing::debug!(image = %outcome.image, "discarding stale detection result");
            return None;
        };

        let boxes = match outcome.result {
            Ok(boxes) => boxes,
            Err(err) => {
                tracing::warn!(image = %current.id, error = %err, "detection failed, showing no faces");
                return Some(OverlayUpdate {
                    image: current.id,
                    overlay: Overlay::NoFacesDetected,
                    thumbnails: Vec::new(),
                    detection_error: Some(err),
                });
            }
        };

        let rects = map_boxes(&boxes, &current.frame);
        let overlay = render(&rects, &self.style);

        let thumbnails: Vec<FaceThumbnail> = boxes
            .iter()
            .zip(rects)
            .filter_map(|(bbox, rect)| match crop_face(&current.original, bbox) {
                Ok(crop) => Some(FaceThumbnail {
                    bbox: *bbox,
                    rect,
                    crop,
                }),
                Err(err) => {
                    tracing::warn!(image = %current.id, error = %err, "skipping face thumbnail");
                    None
                }
            })
            .collect();

        tracing::info!(
            image = %current.id,
            faces = boxes.len(),
            thumbnails = thumbnails.len(),
            "overlay ready"
        );

        Some(OverlayUpdate {
            image: current.id,
            overlay,
            thumbnails,
            detection_error: None,
        })
    }

    fn prepare(&self, source: SourceImage) -> Result<DisplayedImage, PipelineError> {
        let original = Arc::new(normalize(source)?);
        let display = match resample(&original, self.max_dimension)? {
            Cow::Borrowed(_) => Arc::clone(&original),
            Cow::Owned(buffer) => Arc::new(buffer),
        };
        let frame = DisplayFrame::aspect_fit(self.view, display.width(), display.height())?;
        let id = ImageId::new();
        let (display_width, display_height) = (display.width(), display.height());

        tracing::info!(
            image = %id,
            original_width = original.width(),
            original_height = original.height(),
            display_width,
            display_height,
            content_width = frame.content_width(),
            content_height = frame.content_height(),
            "presenting image"
        );

        Ok(DisplayedImage {
            id,
            original,
            display,
            frame,
        })
    }

    fn dispatch(&self, id: ImageId, display: Arc<PixelBuffer>) -> JoinHandle<()> {
        let detector = self.detector.clone();
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = match detector.detect(id, display).await {
                Ok(outcome) => outcome,
                Err(err) => DetectionOutcome {
                    image: id,
                    result: Err(DetectionFailed(err.to_string())),
                },
            };
            let _ = outcomes.send(outcome).await;
        })
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                tracing::debug!("cancelling in-flight detection");
            }
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
