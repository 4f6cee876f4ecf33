//! Canvas Renderer
//!
//! Off-screen drawing surface the pipeline decodes into. Every canvas starts
//! opaque white, so any transparency in a source image is flattened to white.

use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage, RgbaImage};

/// Largest side a canvas may have. libwebp rejects anything wider.
pub const MAX_CANVAS_SIDE: u32 = 16_383;

/// Canvas error
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Cannot allocate a {0}x{1} canvas")]
    Allocation(u32, u32),
}

/// Decode raw file bytes
pub fn decode(data: &[u8]) -> Result<DynamicImage, CanvasError> {
    Ok(image::load_from_memory(data)?)
}

/// Target size that fits `original` inside `max` without upscaling
pub fn calculate_dimensions(
    original_width: u32,
    original_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if original_width <= max_width && original_height <= max_height {
        return (original_width, original_height);
    }

    let width_ratio = max_width as f64 / original_width as f64;
    let height_ratio = max_height as f64 / original_height as f64;
    let ratio = width_ratio.min(height_ratio);

    let width = (original_width as f64 * ratio).round() as u32;
    let height = (original_height as f64 * ratio).round() as u32;
    (width.max(1), height.max(1))
}

/// Where a cover-scaled source lands on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverPlacement {
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Zero or negative; the overflow is cropped equally on both sides
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Scale `source` so it covers `target` entirely, centered
pub fn cover_placement(
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
) -> CoverPlacement {
    let scale = (target_width as f64 / source_width as f64)
        .max(target_height as f64 / source_height as f64);

    let scaled_width = ((source_width as f64 * scale).round() as u32).max(target_width);
    let scaled_height = ((source_height as f64 * scale).round() as u32).max(target_height);

    CoverPlacement {
        scaled_width,
        scaled_height,
        offset_x: (target_width as i64 - scaled_width as i64) / 2,
        offset_y: (target_height as i64 - scaled_height as i64) / 2,
    }
}

/// Opaque RGB drawing surface
#[derive(Debug, Clone)]
pub struct Canvas {
    buffer: RgbImage,
}

impl Canvas {
    /// Allocate a white canvas
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
            return Err(CanvasError::Allocation(width, height));
        }

        Ok(Self {
            buffer: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn buffer(&self) -> &RgbImage {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Draw `source` stretched to exactly the canvas size
    pub fn draw_fit(&mut self, source: &DynamicImage) {
        let (width, height) = (self.width(), self.height());

        let scaled = if source.width() == width && source.height() == height {
            source.to_rgba8()
        } else {
            source
                .resize_exact(width, height, FilterType::Lanczos3)
                .to_rgba8()
        };

        self.composite(&scaled, 0, 0);
    }

    /// Draw `source` scaled to cover the canvas, center-cropped
    pub fn draw_cover(&mut self, source: &DynamicImage) {
        let placement = cover_placement(source.width(), source.height(), self.width(), self.height());

        let scaled = source
            .resize_exact(placement.scaled_width, placement.scaled_height, FilterType::Lanczos3)
            .to_rgba8();

        self.composite(&scaled, placement.offset_x, placement.offset_y);
    }

    /// Source-over blend of `layer` placed at (`offset_x`, `offset_y`)
    fn composite(&mut self, layer: &RgbaImage, offset_x: i64, offset_y: i64) {
        for (x, y, dst) in self.buffer.enumerate_pixels_mut() {
            let sx = x as i64 - offset_x;
            let sy = y as i64 - offset_y;
            if sx < 0 || sy < 0 || sx >= layer.width() as i64 || sy >= layer.height() as i64 {
                continue;
            }

            let src = layer.get_pixel(sx as u32, sy as u32);
            let alpha = src[3] as u32;
            if alpha == 0 {
                continue;
            }

            for c in 0..3 {
                let blended = (src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha) + 127) / 255;
                dst[c] = blended as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_dimensions_within_bounds_unchanged() {
        assert_eq!(calculate_dimensions(800, 600, 1920, 1080), (800, 600));
        assert_eq!(calculate_dimensions(1920, 1080, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_dimensions_bounded_and_proportional() {
        let cases = [
            (4000, 3000, 1920, 1080),
            (1080, 1920, 1920, 1080),
            (5000, 100, 1920, 1080),
            (2000, 2000, 500, 800),
            (1921, 1081, 1920, 1080),
        ];

        for (w, h, max_w, max_h) in cases {
            let (nw, nh) = calculate_dimensions(w, h, max_w, max_h);
            assert!(nw <= max_w && nh <= max_h, "{w}x{h} -> {nw}x{nh}");
            assert!(nw == max_w || nh == max_h);

            let original = w as f64 / h as f64;
            let resized = nw as f64 / nh as f64;
            assert!((original - resized).abs() / original < 0.05, "{w}x{h} -> {nw}x{nh}");
        }
    }

    #[test]
    fn test_dimensions_never_zero() {
        assert_eq!(calculate_dimensions(100_000, 10, 100, 100), (100, 1));
    }

    #[test]
    fn test_cover_placement_centers_overflow() {
        let placement = cover_placement(400, 200, 100, 100);
        assert_eq!(placement.scaled_width, 200);
        assert_eq!(placement.scaled_height, 100);
        assert_eq!(placement.offset_x, -50);
        assert_eq!(placement.offset_y, 0);
    }

    #[test]
    fn test_canvas_rejects_empty() {
        assert!(matches!(Canvas::new(0, 10), Err(CanvasError::Allocation(0, 10))));
    }

    #[test]
    fn test_canvas_side_limit() {
        assert!(Canvas::new(MAX_CANVAS_SIDE, 1).is_ok());
        assert!(matches!(
            Canvas::new(16_384, 1),
            Err(CanvasError::Allocation(16_384, 1))
        ));
        assert!(matches!(
            Canvas::new(1, 16_384),
            Err(CanvasError::Allocation(1, 16_384))
        ));
    }

    #[test]
    fn test_transparency_flattened_to_white() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let mut canvas = Canvas::new(4, 4).unwrap();
        canvas.draw_fit(&clear);
        assert!(canvas.buffer().pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_half_transparent_blends_over_white() {
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 128])));
        let mut canvas = Canvas::new(2, 2).unwrap();
        canvas.draw_fit(&red);
        assert_eq!(*canvas.buffer().get_pixel(0, 0), Rgb([255, 127, 127]));
    }

    #[test]
    fn test_cover_fills_canvas() {
        let mut source = RgbaImage::from_pixel(40, 10, Rgba([0, 0, 255, 255]));
        // Left and right quarters are cropped away
        for y in 0..10 {
            for x in 0..10 {
                source.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                source.put_pixel(39 - x, y, Rgba([255, 0, 0, 255]));
            }
        }

        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.draw_cover(&DynamicImage::ImageRgba8(source));

        assert_eq!(canvas.width(), 10);
        assert_eq!(canvas.height(), 10);
        let center = canvas.buffer().get_pixel(5, 5);
        assert!(center[2] > 200 && center[0] < 50);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"definitely not an image"), Err(CanvasError::Decode(_))));
    }
}
