//! Thumbnail rendering.
//!
//! Decoding, resampling and encoding are delegated to the `image` crate. The
//! renderer only decides the crop rectangle, the output codec and how the
//! result is classified.

use crate::metrics::RENDER_DURATION;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::time::Duration;
use vignette_core::config::RenderConfig;
use vignette_core::{CacheKey, Dimensions, ImageKind, RenderResult};

/// Rendering errors.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to decode source image: {0}")]
    DecodeFailed(String),

    #[error("failed to encode thumbnail: {0}")]
    EncodeFailed(String),

    #[error("encoder produced an unrecognized image format")]
    UnknownFormat,

    #[error("render timed out after {0:?}")]
    TimedOut(Duration),

    #[error("render worker failed: {0}")]
    Worker(String),
}

/// Turns source bytes into a thumbnail of exact target dimensions.
#[derive(Clone, Debug)]
pub struct ThumbnailRenderer {
    crop: bool,
    jpeg_quality: u8,
    timeout: Duration,
}

impl ThumbnailRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            crop: config.crop,
            jpeg_quality: config.jpeg_quality,
            timeout: config.timeout(),
        }
    }

    /// Whether renders crop to the target aspect ratio by default.
    pub fn crop(&self) -> bool {
        self.crop
    }

    /// Render synchronously.
    ///
    /// With `crop` set, the source is first cut to the target aspect ratio
    /// around its centre; otherwise it is scaled straight to the target and
    /// may be distorted. PNG sources stay PNG, anything else becomes JPEG.
    /// The output kind is read back from the encoded bytes.
    pub fn render(
        &self,
        source: &[u8],
        target: Dimensions,
        crop: bool,
        storage_key: CacheKey,
    ) -> Result<RenderResult, RenderError> {
        let format =
            image::guess_format(source).map_err(|e| RenderError::DecodeFailed(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(source, format)
            .map_err(|e| RenderError::DecodeFailed(e.to_string()))?;

        let framed = if crop {
            center_crop(&decoded, target)
        } else {
            decoded
        };
        let resized = framed.resize_exact(target.width, target.height, FilterType::CatmullRom);

        let mut encoded = Vec::new();
        let written = match format {
            ImageFormat::Png => resized.write_with_encoder(PngEncoder::new(&mut encoded)),
            _ => DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(
                JpegEncoder::new_with_quality(&mut encoded, self.jpeg_quality),
            ),
        };
        written.map_err(|e| RenderError::EncodeFailed(e.to_string()))?;

        let kind = ImageKind::sniff(&encoded).ok_or(RenderError::UnknownFormat)?;
        Ok(RenderResult::new(Bytes::from(encoded), kind, storage_key))
    }

    /// Render on the blocking pool, bounded by the configured timeout.
    ///
    /// On timeout the worker thread is left to finish on its own; its result
    /// is discarded.
    pub async fn render_async(
        &self,
        source: Bytes,
        target: Dimensions,
        storage_key: CacheKey,
    ) -> Result<RenderResult, RenderError> {
        let renderer = self.clone();
        let _timer = RENDER_DURATION.start_timer();
        let task = tokio::task::spawn_blocking(move || {
            renderer.render(&source, target, renderer.crop, storage_key)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RenderError::Worker(e.to_string())),
            Err(_) => Err(RenderError::TimedOut(self.timeout)),
        }
    }
}

/// Largest centred region of `image` with the aspect ratio of `target`.
fn center_crop(image: &DynamicImage, target: Dimensions) -> DynamicImage {
    let (width, height) = (image.width() as u64, image.height() as u64);
    let (target_w, target_h) = (target.width as u64, target.height as u64);

    if width * target_h > height * target_w {
        let crop_w = ((height * target_w) / target_h).max(1);
        let x = (width - crop_w) / 2;
        image.crop_imm(x as u32, 0, crop_w as u32, height as u32)
    } else if width * target_h < height * target_w {
        let crop_h = ((width * target_h) / target_w).max(1);
        let y = (height - crop_h) / 2;
        image.crop_imm(0, y as u32, width as u32, crop_h as u32)
    } else {
        image.clone()
    }
}
