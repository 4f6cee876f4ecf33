//! Compression Models
//!
//! Inputs and outputs of a single compression call.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::watermark::WatermarkConfig;

/// Output encoding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "webp" => Some(Self::WebP),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Encoder quality selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Pick a tier from the original file size
    #[default]
    Auto,
    /// Explicit quality (1-100)
    Fixed(u8),
}

impl Quality {
    /// Resolve to a concrete 1-100 quality for a file of `file_size` bytes
    pub fn resolve(&self, file_size: u64) -> u8 {
        match self {
            Self::Auto => crate::services::quality::adaptive_quality(file_size),
            Self::Fixed(q) => (*q).clamp(1, 100),
        }
    }
}

/// Options for one compression call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    /// Maximum output width in pixels
    pub max_width: u32,
    /// Maximum output height in pixels
    pub max_height: u32,
    pub quality: Quality,
    pub format: OutputFormat,
    /// Fit inside the bounds; when false the output fills `max_width x max_height` and is center-cropped
    pub preserve_aspect_ratio: bool,
    /// Watermark drawn before encoding
    pub watermark: Option<WatermarkConfig>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: Quality::Auto,
            format: OutputFormat::WebP,
            preserve_aspect_ratio: true,
            watermark: None,
        }
    }
}

/// Options for the fixed-canvas converter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    pub quality: Quality,
    pub format: OutputFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            quality: Quality::Fixed(85),
            format: OutputFormat::WebP,
        }
    }
}

/// An input file handed to the pipeline
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Original file name
    pub name: String,
    /// Raw file bytes
    pub data: Vec<u8>,
    /// Declared MIME type, if the caller knows it
    pub mime_type: Option<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// MIME type: declared, sniffed from content, then guessed from the name
    pub fn detect_mime_type(&self) -> String {
        if let Some(ref declared) = self.mime_type {
            return declared.clone();
        }

        if let Some(kind) = infer::get(&self.data) {
            return kind.mime_type().to_string();
        }

        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .to_string()
    }

    /// Wrap the untouched bytes as a blob
    pub fn into_blob(self) -> Blob {
        let mime_type = self.detect_mime_type();
        Blob::new(self.data, mime_type)
    }
}

/// Encoded bytes plus their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Inline `data:` URL for previews
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Outcome of compressing one file
#[derive(Debug, Clone)]
pub struct CompressResult {
    pub file_name: String,
    pub blob: Blob,
    /// Input size in bytes
    pub original_size: u64,
    /// Output size in bytes
    pub new_size: u64,
    /// Size reduction in whole percent, never negative
    pub savings: u32,
    pub width: u32,
    pub height: u32,
}

impl CompressResult {
    /// Result for a file that could not be processed: the original bytes, unchanged
    pub fn fallback(file: SourceFile) -> Self {
        let size = file.size();
        let file_name = file.name.clone();

        Self {
            file_name,
            blob: file.into_blob(),
            original_size: size,
            new_size: size,
            savings: 0,
            width: 0,
            height: 0,
        }
    }

    /// Bytes saved
    pub fn bytes_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.new_size)
    }
}

/// `round((original - new) / original * 100)`, clamped to zero
pub fn savings_percent(original_size: u64, new_size: u64) -> u32 {
    if original_size == 0 || new_size >= original_size {
        return 0;
    }

    let saved = (original_size - new_size) as f64;
    (saved / original_size as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savings_never_negative() {
        assert_eq!(savings_percent(100, 150), 0);
        assert_eq!(savings_percent(0, 10), 0);
        assert_eq!(savings_percent(1000, 250), 75);
        assert_eq!(savings_percent(3, 2), 33);
    }

    #[test]
    fn test_quality_resolve() {
        assert_eq!(Quality::Fixed(0).resolve(10), 1);
        assert_eq!(Quality::Fixed(250).resolve(10), 100);
        assert_eq!(Quality::Fixed(60).resolve(10 * 1024 * 1024), 60);
        assert_eq!(Quality::Auto.resolve(10), 95);
    }

    #[test]
    fn test_fallback_keeps_original_bytes() {
        let file = SourceFile::new("broken.jpg", vec![0u8; 64]);
        let result = CompressResult::fallback(file);

        assert_eq!(result.original_size, 64);
        assert_eq!(result.new_size, 64);
        assert_eq!(result.savings, 0);
        assert_eq!(result.blob.data, vec![0u8; 64]);
        assert_eq!(result.blob.mime_type, "image/jpeg");
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::from_extension("JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("png"), None);
        assert_eq!(OutputFormat::WebP.mime_type(), "image/webp");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: CompressOptions =
            serde_json::from_str(r#"{"max_width": 800, "quality": {"fixed": 70}}"#).unwrap();
        assert_eq!(options.max_width, 800);
        assert_eq!(options.max_height, 1080);
        assert_eq!(options.quality, Quality::Fixed(70));
        assert!(options.preserve_aspect_ratio);
    }

    #[test]
    fn test_data_url() {
        let blob = Blob::new(b"abc".to_vec(), "image/webp");
        assert_eq!(blob.to_data_url(), "data:image/webp;base64,YWJj");
    }
}
