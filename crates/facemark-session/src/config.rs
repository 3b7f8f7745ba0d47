use facemark_core::{OverlayStyle, ViewRect};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Size and position of the view that hosts the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 480.0,
        }
    }
}

/// Face rectangle appearance.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub stroke_width: f32,
    pub stroke_color: [u8; 4],
    pub opacity: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            stroke_width: style.stroke_width,
            stroke_color: style.stroke_color,
            opacity: style.opacity,
        }
    }
}

/// Pipeline configuration: defaults, then an optional TOML file, then
/// `FACEMARK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Longest side of the displayed copy, in pixels (default: 500).
    pub max_dimension: u32,
    /// Number of detection requests that may wait for the worker.
    pub detector_queue_depth: usize,
    pub view: ViewConfig,
    pub overlay: OverlayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_dimension: 500,
            detector_queue_depth: 4,
            view: ViewConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Config {
    /// Load from `FACEMARK_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("FACEMARK_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEMARK_*` overrides read through `lookup`. Values that fail to
    /// parse are ignored and the current setting is kept.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.max_dimension = parsed(lookup("FACEMARK_MAX_DIMENSION"), self.max_dimension);
        self.detector_queue_depth = parsed(lookup("FACEMARK_DETECTOR_QUEUE"), self.detector_queue_depth);
        self.view.width = parsed(lookup("FACEMARK_VIEW_WIDTH"), self.view.width);
        self.view.height = parsed(lookup("FACEMARK_VIEW_HEIGHT"), self.view.height);
        self.overlay.stroke_width = parsed(lookup("FACEMARK_STROKE_WIDTH"), self.overlay.stroke_width);
        self.overlay.opacity = parsed(lookup("FACEMARK_OVERLAY_OPACITY"), self.overlay.opacity);
        if let Some(color) = lookup("FACEMARK_STROKE_COLOR").as_deref().and_then(parse_hex_color) {
            self.overlay.stroke_color = color;
        }
        self
    }

    pub fn view_rect(&self) -> ViewRect {
        ViewRect::new(self.view.x, self.view.y, self.view.width, self.view.height)
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            stroke_width: self.overlay.stroke_width,
            stroke_color: self.overlay.stroke_color,
            opacity: self.overlay.opacity.clamp(0.0, 1.0),
        }
    }
}

fn parsed<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
pub fn parse_hex_color(text: &str) -> Option<[u8; 4]> {
    let hex = text.trim().trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Some([byte(0)?, byte(2)?, byte(4)?, alpha])
}
