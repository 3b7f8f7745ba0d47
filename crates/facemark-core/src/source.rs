//! Image acquisition boundary: encoded files or bytes, and raw pixel handoffs.

use crate::buffer::{ColorSpace, DecodeError, PixelBuffer, PixelFormat};
use crate::orientation::OrientationTag;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Raw pixels as handed over by a capture device, not yet validated.
#[derive(Debug, Clone)]
pub struct RawPixels {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride in bytes.
    pub stride: usize,
    pub color_space: ColorSpace,
    pub data: Vec<u8>,
}

/// An acquired still image, before orientation normalization.
#[derive(Debug, Clone)]
pub enum SourceImage {
    /// JPEG/PNG/WebP bytes; the orientation comes from EXIF metadata.
    Encoded(Vec<u8>),
    /// Raw pixels with an orientation tag supplied by the source.
    Raw {
        pixels: RawPixels,
        orientation: OrientationTag,
    },
}

impl SourceImage {
    /// Read an encoded image from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        Ok(SourceImage::Encoded(std::fs::read(path)?))
    }

    /// Validate/decode the pixels and read the orientation tag.
    pub fn decode(self) -> Result<(PixelBuffer, OrientationTag), DecodeError> {
        match self {
            SourceImage::Encoded(bytes) => decode_encoded(&bytes),
            SourceImage::Raw {
                pixels,
                orientation,
            } => {
                let buffer = PixelBuffer::new(
                    pixels.width,
                    pixels.height,
                    pixels.format,
                    pixels.stride,
                    pixels.data,
                )?
                .with_color_space(pixels.color_space);
                Ok((buffer, orientation))
            }
        }
    }
}

fn decode_encoded(bytes: &[u8]) -> Result<(PixelBuffer, OrientationTag), DecodeError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = OrientationTag::from_exif(decoder.orientation()?.to_exif());
    let image = DynamicImage::from_decoder(decoder)?;

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        ?orientation,
        "decoded source image"
    );

    Ok((PixelBuffer::from_dynamic(image)?, orientation))
}

/// Supplies acquired images. `Ok(None)` means the user cancelled.
pub trait ImageSource {
    fn acquire(&mut self) -> Result<Option<SourceImage>, DecodeError>;
}

impl<F> ImageSource for F
where
    F: FnMut() -> Result<Option<SourceImage>, DecodeError>,
{
    fn acquire(&mut self) -> Result<Option<SourceImage>, DecodeError> {
        self()
    }
}

/// Reads a single file from disk; yields nothing once taken.
pub struct FileSource {
    path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ImageSource for FileSource {
    fn acquire(&mut self) -> Result<Option<SourceImage>, DecodeError> {
        match self.path.take() {
            Some(path) => {
                tracing::info!(path = %path.display(), "reading image file");
                SourceImage::from_path(&path).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::normalize;
    use image::codecs::jpeg::JpegEncoder;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, RgbImage};

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn make_test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        let mut out = Vec::new();
        JpegEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    /// Insert an APP1 Exif segment holding only an Orientation entry right
    /// after the SOI marker.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a");
        tiff.extend_from_slice(&8u32.to_be_bytes());
        tiff.extend_from_slice(&1u16.to_be_bytes());
        // tag 0x0112, SHORT, count 1, value left-justified
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03]);
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut payload = b"Exif\x00\x00".to_vec();
        payload.extend_from_slice(&tiff);
        let length = (payload.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_decode_jpeg_reads_exif_orientation() {
        let jpeg = with_exif_orientation(&make_test_jpeg(40, 20), 6);

        let (buf, tag) = SourceImage::Encoded(jpeg.clone()).decode().unwrap();
        assert_eq!(buf.dimensions(), (40, 20));
        assert_eq!(tag, OrientationTag::Right);

        let upright = normalize(SourceImage::Encoded(jpeg)).unwrap();
        assert_eq!(upright.dimensions(), (20, 40));
    }

    #[test]
    fn test_decode_jpeg_without_exif_is_up() {
        let (_, tag) = SourceImage::Encoded(make_test_jpeg(8, 8)).decode().unwrap();
        assert_eq!(tag, OrientationTag::Up);
    }

    #[test]
    fn test_decode_png_defaults_to_up() {
        let (buf, tag) = SourceImage::Encoded(make_test_png(20, 10)).decode().unwrap();
        assert_eq!(buf.dimensions(), (20, 10));
        assert_eq!(buf.format(), PixelFormat::Rgb8);
        assert_eq!(tag, OrientationTag::Up);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = SourceImage::Encoded(b"not an image".to_vec()).decode();
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_short_storage_fails() {
        let source = SourceImage::Raw {
            pixels: RawPixels {
                width: 4,
                height: 4,
                format: PixelFormat::Rgba8,
                stride: 16,
                color_space: ColorSpace::Srgb,
                data: vec![0; 32],
            },
            orientation: OrientationTag::Right,
        };
        assert!(matches!(source.decode(), Err(DecodeError::InvalidLength { .. })));
    }

    #[test]
    fn test_raw_keeps_tag_and_color_space() {
        let source = SourceImage::Raw {
            pixels: RawPixels {
                width: 2,
                height: 2,
                format: PixelFormat::Gray8,
                stride: 2,
                color_space: ColorSpace::DisplayP3,
                data: vec![0; 4],
            },
            orientation: OrientationTag::LeftMirrored,
        };
        let (buf, tag) = source.decode().unwrap();
        assert_eq!(tag, OrientationTag::LeftMirrored);
        assert_eq!(buf.color_space(), ColorSpace::DisplayP3);
    }

    #[test]
    fn test_file_source_yields_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, make_test_png(8, 8)).unwrap();

        let mut source = FileSource::new(&path);
        assert!(source.acquire().unwrap().is_some());
        assert!(source.acquire().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut source = FileSource::new("/nonexistent/facemark/photo.jpg");
        assert!(matches!(source.acquire(), Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_closure_source_cancel() {
        let mut cancelled = || -> Result<Option<SourceImage>, DecodeError> { Ok(None) };
        assert!(cancelled.acquire().unwrap().is_none());
    }
}
