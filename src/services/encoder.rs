//! Encoder
//!
//! Serializes an opaque RGB buffer to WebP or JPEG.

use image::{codecs::jpeg::JpegEncoder, RgbImage};

use crate::models::{Blob, OutputFormat};

/// Encode error
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
    #[error("WebP encoding failed: {0}")]
    WebP(String),
    #[error("Encoder produced no data")]
    Empty,
}

/// Encode `buffer` at `quality` (1-100)
pub fn encode(buffer: &RgbImage, format: OutputFormat, quality: u8) -> Result<Blob, EncodeError> {
    let quality = quality.clamp(1, 100);

    let data = match format {
        OutputFormat::Jpeg => encode_jpeg(buffer, quality)?,
        OutputFormat::WebP => encode_webp(buffer, quality)?,
    };

    if data.is_empty() {
        return Err(EncodeError::Empty);
    }

    Ok(Blob::new(data, format.mime_type()))
}

fn encode_jpeg(buffer: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, quality);
    buffer.write_with_encoder(encoder)?;
    Ok(data)
}

fn encode_webp(buffer: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let encoder = webp::Encoder::from_rgb(buffer.as_raw(), buffer.width(), buffer.height());
    let memory = encoder
        .encode_simple(false, quality as f32)
        .map_err(|e| EncodeError::WebP(format!("{:?}", e)))?;
    Ok(memory.to_vec())
}
