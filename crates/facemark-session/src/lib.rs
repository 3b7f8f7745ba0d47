//! facemark-session — One live image, a detector worker thread, and the guard
//! that keeps stale detection results off the screen.

pub mod config;
pub mod engine;
pub mod session;

pub use config::{parse_hex_color, Config, ConfigError, OverlayConfig, ViewConfig};
pub use engine::{spawn_detector, DetectionOutcome, DetectorHandle, EngineError};
pub use session::{DisplayedImage, FaceThumbnail, ImageId, OverlayUpdate, PipelineError, Session};
