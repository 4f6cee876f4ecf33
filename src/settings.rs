//! Pipeline Settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{CompressOptions, ConvertOptions, OutputFormat, Quality, WatermarkConfig};

/// Settings error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Image pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    // Compression
    /// Maximum output width
    pub max_width: u32,
    /// Maximum output height
    pub max_height: u32,
    /// Output quality
    pub quality: Quality,
    /// Output format
    pub format: OutputFormat,
    /// Fit inside the bounds instead of filling them
    pub preserve_aspect_ratio: bool,
    /// Largest accepted input in bytes
    pub max_input_size: u64,

    // Image converter
    /// Fixed canvas width
    pub converter_width: u32,
    /// Fixed canvas height
    pub converter_height: u32,
    /// Converter quality
    pub converter_quality: Quality,

    // Watermark
    /// Watermark drawn during compression
    pub watermark: WatermarkConfig,
    /// Apply the watermark during compression
    pub watermark_on_compress: bool,

    // Preloading
    /// Simultaneous gallery preloads
    pub preload_max_concurrent: usize,
    /// User agent for remote fetches
    pub user_agent: String,

    // Storage
    /// Path for local storage
    pub storage_path: String,
    /// Base URL for stored files
    pub base_url: String,
    /// Organize stored files by date
    pub organize_by_date: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            // Compression
            max_width: 1920,
            max_height: 1080,
            quality: Quality::Auto,
            format: OutputFormat::WebP,
            preserve_aspect_ratio: true,
            max_input_size: 50 * 1024 * 1024, // 50MB

            // Image converter
            converter_width: 1200,
            converter_height: 800,
            converter_quality: Quality::Fixed(85),

            // Watermark
            watermark: WatermarkConfig::default(),
            watermark_on_compress: false,

            // Preloading
            preload_max_concurrent: 3,
            user_agent: concat!("imagepipe/", env!("CARGO_PKG_VERSION")).to_string(),

            // Storage
            storage_path: "uploads/images".to_string(),
            base_url: "/images".to_string(),
            organize_by_date: true,
        }
    }
}

impl PipelineSettings {
    /// Load settings from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Per-call compression options
    pub fn compress_options(&self) -> CompressOptions {
        CompressOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            format: self.format,
            preserve_aspect_ratio: self.preserve_aspect_ratio,
            watermark: self.watermark_on_compress.then(|| self.watermark.clone()),
        }
    }

    /// Per-call converter options
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            width: self.converter_width,
            height: self.converter_height,
            quality: self.converter_quality,
            format: self.format,
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_width == 0 || self.max_height == 0 {
            errors.push("Maximum dimensions must be greater than 0".to_string());
        }

        if self.converter_width == 0 || self.converter_height == 0 {
            errors.push("Converter canvas must be greater than 0".to_string());
        }

        for (name, quality) in [("Quality", self.quality), ("Converter quality", self.converter_quality)] {
            if let Quality::Fixed(q) = quality {
                if q == 0 || q > 100 {
                    errors.push(format!("{} must be between 1 and 100", name));
                }
            }
        }

        if self.max_input_size == 0 {
            errors.push("Max input size must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.watermark.opacity) {
            errors.push("Watermark opacity must be between 0 and 1".to_string());
        }

        if self.watermark.font_size <= 0.0 {
            errors.push("Watermark font size must be greater than 0".to_string());
        }

        if self.preload_max_concurrent == 0 {
            errors.push("Preload concurrency must be at least 1".to_string());
        }

        if self.storage_path.is_empty() {
            errors.push("Storage path cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());

        let options = settings.compress_options();
        assert_eq!((options.max_width, options.max_height), (1920, 1080));
        assert!(options.watermark.is_none());
    }

    #[test]
    fn test_validation_collects_errors() {
        let settings = PipelineSettings {
            quality: Quality::Fixed(0),
            preload_max_concurrent: 0,
            storage_path: String::new(),
            ..Default::default()
        };

        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_watermark_on_compress() {
        let settings = PipelineSettings {
            watermark_on_compress: true,
            ..Default::default()
        };
        assert_eq!(settings.compress_options().watermark, Some(WatermarkConfig::default()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imagepipe.json");

        let settings = PipelineSettings {
            max_width: 1280,
            format: OutputFormat::Jpeg,
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = PipelineSettings::load(&path).unwrap();
        assert_eq!(loaded.max_width, 1280);
        assert_eq!(loaded.format, OutputFormat::Jpeg);
        assert_eq!(loaded.converter_quality, Quality::Fixed(85));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"max_height": 720, "watermark": {"text": "Open House"}}"#).unwrap();

        let loaded = PipelineSettings::load(&path).unwrap();
        assert_eq!(loaded.max_height, 720);
        assert_eq!(loaded.max_width, 1920);
        assert_eq!(loaded.watermark.text, "Open House");
        assert!(loaded.watermark.enabled);
    }
}
