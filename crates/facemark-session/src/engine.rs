use crate::session::ImageId;
use facemark_core::{DetectionFailed, FaceDetector, NormalizedBox, PixelBuffer};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn detector thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("detector thread exited")]
    ChannelClosed,
}

/// Detector output for one image, tagged with the image it was issued for.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub image: ImageId,
    pub result: Result<Vec<NormalizedBox>, DetectionFailed>,
}

/// Messages sent from the session to the detector thread.
struct DetectionRequest {
    image: ImageId,
    buffer: Arc<PixelBuffer>,
    reply: oneshot::Sender<DetectionOutcome>,
}

/// Clone-safe handle to the detector thread.
#[derive(Clone)]
pub struct DetectorHandle {
    tx: mpsc::Sender<DetectionRequest>,
}

impl DetectorHandle {
    /// Queue `buffer` for detection and wait for the tagged outcome.
    ///
    /// Dropping the returned future cancels the request: the worker skips
    /// requests whose caller has gone away.
    pub async fn detect(
        &self,
        image: ImageId,
        buffer: Arc<PixelBuffer>,
    ) -> Result<DetectionOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(DetectionRequest {
                image,
                buffer,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the detector on a dedicated OS thread.
///
/// The thread serves requests in order until every [`DetectorHandle`] is
/// dropped. There is no timeout: a detector that never returns stalls only
/// the requests queued behind it.
pub fn spawn_detector(
    detector: Box<dyn FaceDetector>,
    queue_depth: usize,
) -> Result<DetectorHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<DetectionRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name("facemark-detector".into())
        .spawn(move || {
            tracing::info!("detector thread started");
            while let Some(req) = rx.blocking_recv() {
                if req.reply.is_closed() {
                    tracing::debug!(image = %req.image, "skipping cancelled detection request");
                    continue;
                }
                let started = std::time::Instant::now();
                let result = detector.detect(&req.buffer);
                match &result {
                    Ok(faces) => tracing::debug!(
                        image = %req.image,
                        faces = faces.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "detection finished"
                    ),
                    Err(err) => tracing::warn!(image = %req.image, error = %err, "detection failed"),
                }
                let _ = req.reply.send(DetectionOutcome {
                    image: req.image,
                    result,
                });
            }
            tracing::info!("detector thread exiting");
        })?;

    Ok(DetectorHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facemark_core::{FixedDetector, PixelFormat};
    use std::sync::Mutex;

    fn tiny() -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::packed(2, 2, PixelFormat::Gray8, vec![0; 4]).unwrap())
    }

    /// Records the width of every buffer it is asked to scan.
    struct Recording(Arc<Mutex<Vec<u32>>>);

    impl FaceDetector for Recording {
        fn detect(&self, image: &PixelBuffer) -> Result<Vec<NormalizedBox>, DetectionFailed> {
            self.0
                .lock()
                .map_err(|e| DetectionFailed(e.to_string()))?
                .push(image.width());
            Ok(vec![])
        }
    }

    fn wide(width: u32) -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::packed(width, 1, PixelFormat::Gray8, vec![0; width as usize]).unwrap())
    }

    #[tokio::test]
    async fn test_outcome_is_tagged_with_request_image() {
        let boxes = vec![NormalizedBox::new(0.1, 0.1, 0.2, 0.2)];
        let handle = spawn_detector(Box::new(FixedDetector::new(boxes.clone())), 4).unwrap();

        let id = ImageId::new();
        let outcome = handle.detect(id, tiny()).await.unwrap();
        assert_eq!(outcome.image, id);
        assert_eq!(outcome.result.unwrap(), boxes);
    }

    #[tokio::test]
    async fn test_requests_served_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = spawn_detector(Box::new(Recording(seen.clone())), 4).unwrap();

        let (a, b, c) = (ImageId::new(), ImageId::new(), ImageId::new());
        // The first poll of join! queues a, b, c in argument order.
        let (ra, rb, rc) = tokio::join!(
            handle.detect(a, wide(1)),
            handle.detect(b, wide(2)),
            handle.detect(c, wide(3)),
        );

        assert_eq!(ra.unwrap().image, a);
        assert_eq!(rb.unwrap().image, b);
        assert_eq!(rc.unwrap().image, c);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_queue_depth_is_usable() {
        let handle = spawn_detector(Box::new(FixedDetector::default()), 0).unwrap();
        let outcome = handle.detect(ImageId::new(), tiny()).await.unwrap();
        assert!(outcome.result.unwrap().is_empty());
    }
}
