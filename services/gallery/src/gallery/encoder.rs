//! services/gallery/src/gallery/encoder.rs
//!
//! Turns a picked file or a captured camera frame into a `data:` URL that can
//! travel inline inside a photo record.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use lecture_gallery_core::domain::{EncodedImage, Frame};
use lecture_gallery_core::ports::{PortError, PortResult};
use std::io::Cursor;
use tracing::debug;

pub const DEFAULT_MAX_WIDTH: u32 = 900;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Where the pixels come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// The raw bytes of a user-selected file. Stored as-is.
    File(Vec<u8>),
    /// A still frame from the camera. Downscaled and re-encoded as JPEG.
    Frame(Frame),
}

/// Encodes images for inline storage.
///
/// Records live inside the document store, which has a per-record size
/// ceiling, so camera frames are shrunk to at most `max_width` pixels wide.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_width: u32,
    quality: u8,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH, DEFAULT_JPEG_QUALITY)
    }
}

impl Encoder {
    pub fn new(max_width: u32, quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode(&self, source: ImageSource) -> PortResult<EncodedImage> {
        match source {
            ImageSource::File(bytes) => self.encode_file(&bytes),
            ImageSource::Frame(frame) => self.encode_frame(frame),
        }
    }

    /// Wraps the file's own bytes in a data URL after checking they decode.
    pub fn encode_file(&self, bytes: &[u8]) -> PortResult<EncodedImage> {
        if bytes.is_empty() {
            return Err(PortError::EncodingError("the selected file is empty".to_string()));
        }
        let format = image::guess_format(bytes)
            .map_err(|e| PortError::EncodingError(format!("unrecognised image file: {}", e)))?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| PortError::EncodingError(format!("unreadable image file: {}", e)))?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(PortError::EncodingError("image has no pixels".to_string()));
        }

        let mime_type = format.to_mime_type().to_string();
        debug!("Encoded picked file ({}x{}, {}).", width, height, mime_type);
        Ok(EncodedImage {
            data_url: data_url(&mime_type, bytes),
            mime_type,
            width,
            height,
        })
    }

    /// Downscales a frame to the width ceiling (never upscaling) and encodes it as JPEG.
    pub fn encode_frame(&self, frame: Frame) -> PortResult<EncodedImage> {
        let Frame { width, height, rgba } = frame;
        if width == 0 || height == 0 {
            return Err(PortError::EncodingError(format!(
                "frame has zero dimension ({}x{})",
                width, height
            )));
        }
        let pixels = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            PortError::EncodingError(format!(
                "frame buffer does not hold {}x{} RGBA pixels",
                width, height
            ))
        })?;

        let (target_width, target_height) = scaled_size(width, height, self.max_width);
        let pixels = if (target_width, target_height) == (width, height) {
            pixels
        } else {
            image::imageops::resize(&pixels, target_width, target_height, FilterType::Triangle)
        };

        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgba8(pixels).to_rgb8();
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        DynamicImage::ImageRgb8(rgb)
            .write_with_encoder(encoder)
            .map_err(|e| PortError::EncodingError(format!("JPEG encoding failed: {}", e)))?;

        debug!(
            "Encoded frame {}x{} -> {}x{}.",
            width, height, target_width, target_height
        );
        Ok(EncodedImage {
            data_url: data_url("image/jpeg", &buf.into_inner()),
            mime_type: "image/jpeg".to_string(),
            width: target_width,
            height: target_height,
        })
    }
}

/// Computes the output size for `scale = min(max_width / width, 1)`, truncating
/// the scaled height the way a canvas does.
pub fn scaled_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled_height = (u64::from(height) * u64::from(max_width) / u64::from(width)) as u32;
    (max_width, scaled_height.max(1))
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}
