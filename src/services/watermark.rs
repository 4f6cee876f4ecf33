//! Watermark Compositor
//!
//! Draws a single line of text over an image: a translucent black outline
//! pass followed by a white fill pass, so the text stays legible over any
//! background. Glyph outlines come from `ttf-parser` and are rasterized with
//! `tiny-skia`.

use std::path::Path;
use std::sync::OnceLock;

use image::RgbImage;
use tiny_skia::{FillRule, IntSize, Paint, Pixmap, Stroke, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::models::{Blob, OutputFormat, WatermarkConfig, WatermarkPosition};
use super::canvas::{self, Canvas, CanvasError};
use super::encoder::{self, EncodeError};

/// Distance between the text and the image edge
pub const WATERMARK_PADDING: f32 = 20.0;

/// Quality used when a finished blob is re-encoded with a watermark.
/// Independent of the quality the blob was first encoded at.
pub const WATERMARK_REENCODE_QUALITY: u8 = 85;

const OUTLINE_WIDTH: f32 = 2.0;

/// Watermark error
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("No usable font found")]
    FontUnavailable,
    #[error("Font error: {0}")]
    Font(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot create a {0}x{1} drawing surface")]
    Surface(u32, u32),
    #[error("Watermark task failed: {0}")]
    Task(String),
}

/// Horizontal alignment of the text relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    Center,
    End,
}

/// Anchor point of the text: `x` per `align`, `y` is the alphabetic baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextAnchor {
    pub x: f32,
    pub y: f32,
    pub align: TextAlign,
}

/// Anchor for `position` on a `width x height` image.
///
/// `Center` puts the baseline on the vertical middle; the text is not
/// centered on its own height.
pub fn watermark_anchor(
    position: WatermarkPosition,
    width: u32,
    height: u32,
    font_size: f32,
) -> TextAnchor {
    let (width, height) = (width as f32, height as f32);
    let top = WATERMARK_PADDING + font_size;
    let bottom = height - WATERMARK_PADDING;

    match position {
        WatermarkPosition::TopLeft => TextAnchor { x: WATERMARK_PADDING, y: top, align: TextAlign::Start },
        WatermarkPosition::TopRight => TextAnchor { x: width - WATERMARK_PADDING, y: top, align: TextAlign::End },
        WatermarkPosition::BottomLeft => TextAnchor { x: WATERMARK_PADDING, y: bottom, align: TextAlign::Start },
        WatermarkPosition::BottomRight => TextAnchor { x: width - WATERMARK_PADDING, y: bottom, align: TextAlign::End },
        WatermarkPosition::Center => TextAnchor { x: width / 2.0, y: height / 2.0, align: TextAlign::Center },
    }
}

/// Font bytes plus face index within the collection
pub struct FontData {
    data: Vec<u8>,
    index: u32,
}

impl FontData {
    /// Load from an explicit font file
    pub fn from_file(path: &Path) -> Result<Self, WatermarkError> {
        let data = std::fs::read(path)?;
        Face::parse(&data, 0).map_err(|e| WatermarkError::Font(e.to_string()))?;
        Ok(Self { data, index: 0 })
    }

    /// First sans-serif face installed on the system, or any face at all
    pub fn system_sans_serif() -> Result<Self, WatermarkError> {
        let db = system_fonts();
        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..Default::default()
        };

        let id = db
            .query(&query)
            .or_else(|| db.faces().next().map(|face| face.id))
            .ok_or(WatermarkError::FontUnavailable)?;

        db.with_face_data(id, |data, index| Self { data: data.to_vec(), index })
            .ok_or(WatermarkError::FontUnavailable)
    }

    /// Font selected by `config`
    pub fn for_config(config: &WatermarkConfig) -> Result<Self, WatermarkError> {
        match config.font_path {
            Some(ref path) => Self::from_file(path),
            None => Self::system_sans_serif(),
        }
    }
}

fn system_fonts() -> &'static fontdb::Database {
    static SYSTEM_FONTS: OnceLock<fontdb::Database> = OnceLock::new();
    SYSTEM_FONTS.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "Loaded system fonts");
        db
    })
}

/// Draw the watermark text onto `buffer`. Does nothing when disabled.
pub fn draw_watermark(buffer: &mut RgbImage, config: &WatermarkConfig) -> Result<(), WatermarkError> {
    if !config.enabled || config.text.trim().is_empty() {
        return Ok(());
    }

    let font = FontData::for_config(config)?;
    draw_text(buffer, config, &font)
}

/// Draw `config.text` with an explicit font
pub fn draw_text(
    buffer: &mut RgbImage,
    config: &WatermarkConfig,
    font: &FontData,
) -> Result<(), WatermarkError> {
    let face = Face::parse(&font.data, font.index).map_err(|e| WatermarkError::Font(e.to_string()))?;
    let scale = config.font_size / face.units_per_em() as f32;

    let mut builder = GlyphPathBuilder::new(scale);
    for ch in config.text.chars() {
        let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
        face.outline_glyph(glyph, &mut builder);
        let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        builder.pen_x += advance;
    }

    let text_width = builder.pen_x;
    let Some(path) = builder.finish() else {
        // Only whitespace glyphs
        return Ok(());
    };

    let (width, height) = buffer.dimensions();
    let anchor = watermark_anchor(config.position, width, height, config.font_size);
    let origin_x = match anchor.align {
        TextAlign::Start => anchor.x,
        TextAlign::Center => anchor.x - text_width / 2.0,
        TextAlign::End => anchor.x - text_width,
    };
    let transform = Transform::from_translate(origin_x, anchor.y);

    let mut pixmap = to_pixmap(buffer)?;
    let opacity = config.opacity.clamp(0.0, 1.0);

    let mut outline = Paint::default();
    outline.set_color_rgba8(0, 0, 0, alpha(opacity / 2.0));
    outline.anti_alias = true;
    let stroke = Stroke {
        width: OUTLINE_WIDTH,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &outline, &stroke, transform, None);

    let mut fill = Paint::default();
    fill.set_color_rgba8(255, 255, 255, alpha(opacity));
    fill.anti_alias = true;
    pixmap.fill_path(&path, &fill, FillRule::Winding, transform, None);

    // The buffer is opaque, so premultiplied and straight RGB agree
    for (pixel, rgba) in buffer.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        pixel.0 = [rgba[0], rgba[1], rgba[2]];
    }

    Ok(())
}

/// Watermark an already encoded blob.
///
/// Disabled configs hand the blob straight back. Otherwise the blob is decoded,
/// drawn on, and re-encoded as WebP at [`WATERMARK_REENCODE_QUALITY`].
pub async fn apply_watermark(blob: Blob, config: &WatermarkConfig) -> Result<Blob, WatermarkError> {
    if !config.enabled {
        return Ok(blob);
    }

    let config = config.clone();
    tokio::task::spawn_blocking(move || -> Result<Blob, WatermarkError> {
        let source = canvas::decode(&blob.data)?;
        let mut surface = Canvas::new(source.width(), source.height())?;
        surface.draw_fit(&source);

        draw_watermark(surface.buffer_mut(), &config)?;
        Ok(encoder::encode(surface.buffer(), OutputFormat::WebP, WATERMARK_REENCODE_QUALITY)?)
    })
    .await
    .map_err(|e| WatermarkError::Task(e.to_string()))?
}

fn alpha(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn to_pixmap(buffer: &RgbImage) -> Result<Pixmap, WatermarkError> {
    let (width, height) = buffer.dimensions();
    let size = IntSize::from_wh(width, height).ok_or(WatermarkError::Surface(width, height))?;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in buffer.pixels() {
        rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
    }

    Pixmap::from_vec(rgba, size).ok_or(WatermarkError::Surface(width, height))
}

/// Collects glyph outlines into one path, baseline at y = 0
struct GlyphPathBuilder {
    builder: tiny_skia::PathBuilder,
    scale: f32,
    pen_x: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: tiny_skia::PathBuilder::new(),
            scale,
            pen_x: 0.0,
        }
    }

    fn x(&self, x: f32) -> f32 {
        self.pen_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        -y * self.scale
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(self.x(x), self.y(y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(self.x(x), self.y(y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(self.x(x1), self.y(y1), self.x(x), self.y(y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.x(x1), self.y(y1),
            self.x(x2), self.y(y2),
            self.x(x), self.y(y),
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn fixture_font() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/Tuffy.ttf")
    }

    fn gray_webp(width: u32, height: u32) -> Blob {
        let buffer = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
        encoder::encode(&buffer, OutputFormat::WebP, 90).unwrap()
    }

    #[test]
    fn test_anchor_corners() {
        let anchor = watermark_anchor(WatermarkPosition::BottomRight, 800, 600, 24.0);
        assert_eq!(anchor, TextAnchor { x: 780.0, y: 580.0, align: TextAlign::End });

        let anchor = watermark_anchor(WatermarkPosition::TopLeft, 800, 600, 24.0);
        assert_eq!(anchor, TextAnchor { x: 20.0, y: 44.0, align: TextAlign::Start });

        let anchor = watermark_anchor(WatermarkPosition::TopRight, 800, 600, 30.0);
        assert_eq!(anchor.y, 50.0);
        assert_eq!(anchor.align, TextAlign::End);

        let anchor = watermark_anchor(WatermarkPosition::BottomLeft, 800, 600, 30.0);
        assert_eq!((anchor.x, anchor.y), (20.0, 580.0));
    }

    #[test]
    fn test_anchor_center() {
        let anchor = watermark_anchor(WatermarkPosition::Center, 801, 600, 24.0);
        assert_eq!(anchor, TextAnchor { x: 400.5, y: 300.0, align: TextAlign::Center });
    }

    #[tokio::test]
    async fn test_disabled_returns_same_blob() {
        let blob = gray_webp(32, 32);
        let expected = blob.clone();
        let address = blob.data.as_ptr();

        let config = WatermarkConfig {
            enabled: false,
            ..Default::default()
        };
        let out = apply_watermark(blob, &config).await.unwrap();

        assert_eq!(out, expected);
        assert_eq!(out.data.as_ptr(), address);
    }

    #[tokio::test]
    async fn test_missing_font_file() {
        let config = WatermarkConfig {
            font_path: Some("/nonexistent/fonts/none.ttf".into()),
            ..Default::default()
        };
        let result = apply_watermark(gray_webp(64, 64), &config).await;
        assert!(matches!(result, Err(WatermarkError::Io(_))));
    }

    #[tokio::test]
    async fn test_corrupt_blob() {
        let config = WatermarkConfig::default();
        let result = apply_watermark(Blob::new(vec![1, 2, 3], "image/webp"), &config).await;
        assert!(matches!(result, Err(WatermarkError::Canvas(CanvasError::Decode(_)))));
    }

    #[test]
    fn test_blank_text_is_noop() {
        let mut buffer = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        let config = WatermarkConfig {
            text: "   ".to_string(),
            ..Default::default()
        };
        draw_watermark(&mut buffer, &config).unwrap();
        assert!(buffer.pixels().all(|p| *p == Rgb([1, 2, 3])));
    }

    #[test]
    fn test_watermark_draws_fill_and_outline() {
        let config = WatermarkConfig {
            text: "Sold".to_string(),
            opacity: 1.0,
            font_size: 32.0,
            font_path: Some(fixture_font()),
            ..Default::default()
        };

        let mut buffer = RgbImage::from_pixel(200, 100, Rgb([90, 90, 90]));
        draw_watermark(&mut buffer, &config).unwrap();

        // White fill in the bottom-right corner
        let bright: Vec<(u32, u32)> = buffer
            .enumerate_pixels()
            .filter(|(x, y, p)| *x > 100 && *y > 40 && p[0] > 200)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!bright.is_empty());

        // Half-opacity black outline hugging the fill
        let outlined = buffer.enumerate_pixels().any(|(x, y, p)| {
            p[0] < 70
                && bright
                    .iter()
                    .any(|&(bx, by)| bx.abs_diff(x) <= 2 && by.abs_diff(y) <= 2)
        });
        assert!(outlined);

        assert_eq!(*buffer.get_pixel(5, 5), Rgb([90, 90, 90]));
        assert!(buffer
            .enumerate_pixels()
            .filter(|(x, y, _)| *x < 100 || *y < 40)
            .all(|(_, _, p)| *p == Rgb([90, 90, 90])));
    }

    #[tokio::test]
    async fn test_apply_watermark_reencodes_webp() {
        let config = WatermarkConfig {
            text: "Sold".to_string(),
            font_path: Some(fixture_font()),
            ..Default::default()
        };

        let blob = gray_webp(200, 100);
        let out = apply_watermark(blob.clone(), &config).await.unwrap();
        assert_eq!(out.mime_type, "image/webp");
        assert_ne!(out.data, blob.data);

        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn test_font_from_file() {
        assert!(FontData::from_file(&fixture_font()).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(matches!(FontData::from_file(&bogus), Err(WatermarkError::Font(_))));
    }
}
