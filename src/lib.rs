//! imagepipe - Adaptive Image Compression for Listing Media
//!
//! imagepipe prepares property photos for the web:
//!
//! - **Resize**: Fit inside a bounding box without upscaling, or fill a fixed canvas
//! - **Flatten**: Transparency is always composited onto white
//! - **Re-encode**: WebP or JPEG with quality picked from the original file size
//! - **Watermark**: Outlined text in a corner or the center
//! - **Batches**: Sequential processing with progress, stats and cancellation
//! - **Preloading**: Bounded-concurrency gallery prefetching
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imagepipe::{ImagePipeline, SourceFile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ImagePipeline::new();
//!
//!     let data = std::fs::read("terrace.jpg").unwrap();
//!     let result = pipeline.compress(&SourceFile::new("terrace.jpg", data)).await.unwrap();
//!     println!("{} -> {} bytes ({}% saved)", result.original_size, result.new_size, result.savings);
//! }
//! ```
//!
//! ## Batches
//!
//! ```rust,ignore
//! use imagepipe::ImagePipeline;
//!
//! let pipeline = ImagePipeline::new();
//! let mut state = pipeline.batch().subscribe();
//! tokio::spawn(async move {
//!     while state.changed().await.is_ok() {
//!         if let Some(progress) = state.borrow().progress.clone() {
//!             println!("{}% {}", progress.percentage, progress.file_name);
//!         }
//!     }
//! });
//!
//! let results = pipeline.compress_all(files).await;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use imagepipe::{ImagePipeline, PipelineSettings, Quality, OutputFormat};
//!
//! let mut settings = PipelineSettings::default();
//! settings.max_width = 1280;
//! settings.quality = Quality::Fixed(80);
//! settings.format = OutputFormat::Jpeg;
//!
//! let pipeline = ImagePipeline::with_settings(settings);
//! ```

pub mod models;
pub mod services;
pub mod settings;
pub mod pipeline;

// Re-exports
pub use models::{
    Blob, CompressOptions, CompressResult, CompressionProgress, CompressionStats,
    ConvertOptions, OutputFormat, Quality, SourceFile, WatermarkConfig,
    WatermarkOverrides, WatermarkPosition,
};

pub use services::{
    adaptive_quality, apply_watermark, calculate_dimensions, BatchCompressor, BatchState,
    CompressError, HttpImageLoader, ImageCompressor, ImageLoader, PreloadQueue,
    StorageService, WatermarkError,
};

pub use settings::PipelineSettings;
pub use pipeline::{ImagePipeline, PipelineError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a pipeline with default settings
pub fn init() -> ImagePipeline {
    ImagePipeline::new()
}

/// Create a pipeline with custom settings
pub fn init_with_settings(settings: PipelineSettings) -> ImagePipeline {
    ImagePipeline::with_settings(settings)
}
