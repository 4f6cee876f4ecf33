//! Watermark Models

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Watermark anchor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl WatermarkPosition {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top-left" => Some(Self::TopLeft),
            "top-right" => Some(Self::TopRight),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-right" => Some(Self::BottomRight),
            "center" => Some(Self::Center),
            _ => None,
        }
    }
}

/// Text watermark configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatermarkConfig {
    pub enabled: bool,
    /// Text drawn on the image
    pub text: String,
    /// Logo location, kept for callers; only text is rendered
    pub logo_url: Option<String>,
    pub position: WatermarkPosition,
    /// Opacity (0.0 - 1.0)
    pub opacity: f32,
    /// Font size in pixels
    pub font_size: f32,
    /// Font file; system sans-serif when unset
    pub font_path: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "© All rights reserved".to_string(),
            logo_url: None,
            position: WatermarkPosition::BottomRight,
            opacity: 0.5,
            font_size: 24.0,
            font_path: None,
        }
    }
}

impl WatermarkConfig {
    /// Defaults with the given overrides applied
    pub fn with_overrides(overrides: WatermarkOverrides) -> Self {
        Self::default().merge(overrides)
    }

    /// Copy of this config with every set override replacing its field
    pub fn merge(&self, overrides: WatermarkOverrides) -> Self {
        Self {
            enabled: overrides.enabled.unwrap_or(self.enabled),
            text: overrides.text.unwrap_or_else(|| self.text.clone()),
            logo_url: overrides.logo_url.or_else(|| self.logo_url.clone()),
            position: overrides.position.unwrap_or(self.position),
            opacity: overrides.opacity.unwrap_or(self.opacity).clamp(0.0, 1.0),
            font_size: overrides.font_size.unwrap_or(self.font_size),
            font_path: overrides.font_path.or_else(|| self.font_path.clone()),
        }
    }
}

/// Partially specified watermark config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkOverrides {
    pub enabled: Option<bool>,
    pub text: Option<String>,
    pub logo_url: Option<String>,
    pub position: Option<WatermarkPosition>,
    pub opacity: Option<f32>,
    pub font_size: Option<f32>,
    pub font_path: Option<PathBuf>,
}
