//! Pixel buffer model with explicit pixel format, stride validation and decoding.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel layout of a [`PixelBuffer`]. Always 8 bits per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit grayscale (1 byte/pixel).
    Gray8,
    /// 8-bit RGB (3 bytes/pixel).
    Rgb8,
    /// 8-bit RGB with straight alpha (4 bytes/pixel).
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        self.bytes_per_pixel() as u32 * 8
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba8)
    }
}

/// Color space tag. Carried through every stage, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    #[default]
    Srgb,
    DisplayP3,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image has zero dimensions ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("row stride {stride} is smaller than {min} bytes needed for one row")]
    StrideTooSmall { stride: usize, min: usize },
    #[error("{height} rows of {stride} bytes do not fit in memory")]
    SizeOverflow { stride: usize, height: u32 },
    #[error("invalid pixel storage length: expected at least {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read image source: {0}")]
    Io(#[from] std::io::Error),
}

/// An owned, validated block of pixels.
///
/// Rows are `stride` bytes apart; only the first `width * bytes_per_pixel`
/// bytes of each row carry pixels. Construction guarantees the storage covers
/// `stride * height` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    color_space: ColorSpace,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw storage, validating dimensions, stride and length.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::ZeroDimensions { width, height });
        }
        let min = width as usize * format.bytes_per_pixel();
        if stride < min {
            return Err(DecodeError::StrideTooSmall { stride, min });
        }
        let expected = stride
            .checked_mul(height as usize)
            .ok_or(DecodeError::SizeOverflow { stride, height })?;
        if data.len() < expected {
            return Err(DecodeError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            color_space: ColorSpace::default(),
            data,
        })
    }

    /// Wrap tightly packed rows (`stride == width * bytes_per_pixel`).
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::new(width, height, format, stride, data)
    }

    /// Build from storage the caller has already sized as packed rows.
    pub(crate) fn assemble(
        width: u32,
        height: u32,
        format: PixelFormat,
        color_space: ColorSpace,
        data: Vec<u8>,
    ) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        debug_assert!(width > 0 && height > 0);
        debug_assert_eq!(data.len(), stride * height as usize);
        Self {
            width,
            height,
            stride,
            format,
            color_space,
            data,
        }
    }

    /// Convert a decoded image into a buffer, normalizing exotic channel
    /// layouts (16-bit, float, gray+alpha) to the nearest 8-bit format.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::ZeroDimensions { width, height });
        }
        let (format, data) = match image {
            DynamicImage::ImageLuma8(img) => (PixelFormat::Gray8, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (PixelFormat::Rgb8, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (PixelFormat::Rgba8, img.into_raw()),
            other if other.color().has_alpha() => (PixelFormat::Rgba8, other.to_rgba8().into_raw()),
            other if other.color().has_color() => (PixelFormat::Rgb8, other.to_rgb8().into_raw()),
            other => (PixelFormat::Gray8, other.to_luma8().into_raw()),
        };
        Ok(Self::assemble(width, height, format, ColorSpace::default(), data))
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.format.bits_per_pixel()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Raw storage, including any row padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.format.bytes_per_pixel()]
    }

    /// Read one pixel expanded to RGBA.
    pub fn pixel_rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        let p = &self.data[offset..offset + bpp];
        match self.format {
            PixelFormat::Gray8 => [p[0], p[0], p[0], 255],
            PixelFormat::Rgb8 => [p[0], p[1], p[2], 255],
            PixelFormat::Rgba8 => [p[0], p[1], p[2], p[3]],
        }
    }

    /// Copy into an `image` crate buffer of the same format, dropping row padding.
    pub fn to_dynamic(&self) -> DynamicImage {
        let mut packed = Vec::with_capacity(
            self.width as usize * self.height as usize * self.format.bytes_per_pixel(),
        );
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        let (w, h) = (self.width, self.height);
        // Lengths match by construction, so the buffer constructors cannot fail.
        match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(w, h, packed).map(DynamicImage::ImageLuma8),
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, packed).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, packed).map(DynamicImage::ImageRgba8),
        }
        .unwrap_or_else(|| DynamicImage::new(w, h, image::ColorType::Rgba8))
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("color_space", &self.color_space)
            .field("bytes", &self.data.len())
            .finish()
    }
}
