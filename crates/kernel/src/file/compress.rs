//! Image compression.
//!
//! Decodes an uploaded image, scales it down to a requested width and
//! re-encodes it as JPEG. Decoding and encoding are CPU bound, so they run on
//! the blocking pool behind a semaphore.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Maximum output width.
pub const MAX_DIMENSION: u32 = 4096;

/// JPEG quality used for compressed output.
pub const JPEG_QUALITY: u8 = 80;

/// Maximum concurrent image processing operations.
const MAX_CONCURRENT_PROCESSING: usize = 4;

/// Image ingestion errors.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing unavailable")]
    Unavailable,
}

/// Bounded-concurrency JPEG compressor.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    semaphore: Arc<Semaphore>,
    max_input_size: usize,
}

impl ImageProcessor {
    pub fn new(max_input_size: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_PROCESSING)),
            max_input_size,
        }
    }

    /// Compress `data` to a JPEG at most `width` pixels wide.
    pub async fn compress(&self, data: Vec<u8>, width: u32) -> Result<Vec<u8>, ImageError> {
        if data.len() > self.max_input_size {
            return Err(ImageError::TooLarge {
                size: data.len(),
                max: self.max_input_size,
            });
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ImageError::Unavailable)?;

        let input_size = data.len();
        let output = tokio::task::spawn_blocking(move || compress_jpeg(&data, width))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "image compression task failed");
                ImageError::Unavailable
            })??;

        debug!(
            input_size,
            output_size = output.len(),
            width,
            "compressed image"
        );
        Ok(output)
    }
}

/// Decode, downscale and JPEG-encode an image.
///
/// The target width is clamped to `1..=MAX_DIMENSION` and images are never
/// upscaled. Aspect ratio is preserved. Transparency is flattened.
pub fn compress_jpeg(data: &[u8], width: u32) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(data)?;

    let target = width.clamp(1, MAX_DIMENSION);
    let img = if target < img.width() {
        img.resize(target, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut output = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY))?;

    Ok(output)
}
