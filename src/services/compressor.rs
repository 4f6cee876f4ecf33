//! Compressor Service
//!
//! Decode, resize onto a white canvas, optionally watermark, and re-encode a
//! single image. CPU work runs on tokio's blocking pool; a call that has
//! started decoding runs to completion.

use std::sync::Arc;

use image::DynamicImage;

use crate::models::{
    savings_percent, Blob, CompressOptions, CompressResult, ConvertOptions, SourceFile,
};
use super::canvas::{self, calculate_dimensions, Canvas, CanvasError};
use super::encoder::{self, EncodeError};
use super::watermark::{self, WatermarkError};

/// Compression error
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("Canvas unavailable for {0}x{1}")]
    Canvas(u32, u32),
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),
    #[error("Watermark error: {0}")]
    Watermark(#[from] WatermarkError),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Compression task failed: {0}")]
    Task(String),
}

impl From<CanvasError> for CompressError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::Decode(e) => Self::Decode(e),
            CanvasError::Allocation(w, h) => Self::Canvas(w, h),
        }
    }
}

/// Single-image compressor
pub struct ImageCompressor {
    /// Largest accepted input in bytes
    max_input_size: u64,
    /// HTTP client for remote sources
    client: reqwest::Client,
}

impl ImageCompressor {
    /// Create a new compressor
    pub fn new() -> Self {
        Self {
            max_input_size: 50 * 1024 * 1024,
            client: reqwest::Client::new(),
        }
    }

    /// Set the largest accepted input
    pub fn set_max_input_size(&mut self, bytes: u64) {
        self.max_input_size = bytes;
    }

    /// Use a preconfigured HTTP client
    pub fn set_client(&mut self, client: reqwest::Client) {
        self.client = client;
    }

    pub fn max_input_size(&self) -> u64 {
        self.max_input_size
    }

    /// Reject inputs the pipeline will not attempt
    pub fn validate(&self, file: &SourceFile) -> Result<(), CompressError> {
        if file.size() > self.max_input_size {
            return Err(CompressError::FileTooLarge(file.size(), self.max_input_size));
        }
        Ok(())
    }

    /// Compress one file
    pub async fn compress(
        &self,
        file: &SourceFile,
        options: &CompressOptions,
    ) -> Result<CompressResult, CompressError> {
        self.validate(file)?;
        self.compress_shared(Arc::new(file.clone()), options).await
    }

    /// Compress a file without copying its bytes.
    ///
    /// The blocking task holds its reference only until it finishes, so the
    /// caller can take the file back with [`Arc::unwrap_or_clone`] afterwards.
    pub async fn compress_shared(
        &self,
        file: Arc<SourceFile>,
        options: &CompressOptions,
    ) -> Result<CompressResult, CompressError> {
        self.validate(&file)?;

        let options = options.clone();
        tokio::task::spawn_blocking(move || compress_file(&file, &options))
            .await
            .map_err(|e| CompressError::Task(e.to_string()))?
    }

    /// Convert onto a fixed `width x height` canvas, always center-cropped
    pub async fn convert_fixed(
        &self,
        file: &SourceFile,
        options: &ConvertOptions,
    ) -> Result<CompressResult, CompressError> {
        self.validate(file)?;

        let file = file.clone();
        let options = *options;
        tokio::task::spawn_blocking(move || convert_file(&file, &options))
            .await
            .map_err(|e| CompressError::Task(e.to_string()))?
    }

    /// Download `url` and compress it
    pub async fn compress_url(
        &self,
        url: &str,
        options: &CompressOptions,
    ) -> Result<CompressResult, CompressError> {
        let file = self.fetch(url).await?;
        self.compress(&file, options).await
    }

    /// Download `url` into a source file
    pub async fn fetch(&self, url: &str) -> Result<SourceFile, CompressError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CompressError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CompressError::Network(format!("HTTP {}", response.status())));
        }

        let name = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| file_name_from_url(url));

        let mime_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.to_string());

        let data = response
            .bytes()
            .await
            .map_err(|e| CompressError::Network(e.to_string()))?
            .to_vec();

        tracing::debug!(url, file = %name, bytes = data.len(), "Fetched remote image");

        let mut file = SourceFile::new(name, data);
        file.mime_type = mime_type;
        Ok(file)
    }
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Synchronous compression of one file
pub fn compress_file(
    file: &SourceFile,
    options: &CompressOptions,
) -> Result<CompressResult, CompressError> {
    if options.max_width == 0 || options.max_height == 0 {
        return Err(CompressError::Canvas(options.max_width, options.max_height));
    }

    let source = canvas::decode(&file.data)?;

    let mut surface = if options.preserve_aspect_ratio {
        let (width, height) = calculate_dimensions(
            source.width(),
            source.height(),
            options.max_width,
            options.max_height,
        );
        let mut surface = Canvas::new(width, height)?;
        surface.draw_fit(&source);
        surface
    } else {
        let mut surface = Canvas::new(options.max_width, options.max_height)?;
        surface.draw_cover(&source);
        surface
    };
    drop(source);

    if let Some(ref config) = options.watermark {
        watermark::draw_watermark(surface.buffer_mut(), config)?;
    }

    let quality = options.quality.resolve(file.size());
    let blob = encoder::encode(surface.buffer(), options.format, quality)?;

    tracing::debug!(
        file = %file.name,
        quality,
        width = surface.width(),
        height = surface.height(),
        "Compressed image"
    );

    Ok(build_result(file, blob, &surface))
}

/// Synchronous fixed-canvas conversion of one file
pub fn convert_file(
    file: &SourceFile,
    options: &ConvertOptions,
) -> Result<CompressResult, CompressError> {
    let source: DynamicImage = canvas::decode(&file.data)?;

    let mut surface = Canvas::new(options.width, options.height)?;
    surface.draw_cover(&source);
    drop(source);

    let quality = options.quality.resolve(file.size());
    let blob = encoder::encode(surface.buffer(), options.format, quality)?;

    Ok(build_result(file, blob, &surface))
}

fn build_result(file: &SourceFile, blob: Blob, surface: &Canvas) -> CompressResult {
    let original_size = file.size();
    let new_size = blob.size();

    CompressResult {
        file_name: output_name(&file.name, &blob),
        blob,
        original_size,
        new_size,
        savings: savings_percent(original_size, new_size),
        width: surface.width(),
        height: surface.height(),
    }
}

/// `photo.png` encoded as WebP becomes `photo.webp`
fn output_name(original: &str, blob: &Blob) -> String {
    let stem = std::path::Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");

    let ext = match blob.mime_type.as_str() {
        "image/jpeg" => "jpg",
        _ => "webp",
    };

    format!("{}.{}", stem, ext)
}

fn file_name_from_disposition(header: &str) -> Option<String> {
    header
        .split("filename=")
        .nth(1)
        .map(|s| s.split(';').next().unwrap_or(s).trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

/// Last path segment of `url`, or `download`
pub fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "download".to_string())
}
