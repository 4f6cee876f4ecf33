//! Pipeline Services
//!
//! Rendering, encoding, watermarking, batching, preloading and storage.

pub mod quality;
pub mod canvas;
pub mod encoder;
pub mod watermark;
pub mod compressor;
pub mod batch;
pub mod preload;
pub mod storage;

pub use quality::adaptive_quality;
pub use canvas::{calculate_dimensions, cover_placement, Canvas, CanvasError, CoverPlacement};
pub use encoder::{encode, EncodeError};
pub use watermark::{apply_watermark, draw_watermark, watermark_anchor, WatermarkError};
pub use compressor::{CompressError, ImageCompressor};
pub use batch::{BatchCompressor, BatchState, CancelHandle};
pub use preload::{HttpImageLoader, ImageLoader, PreloadError, PreloadQueue, PreloadStats};
pub use storage::{StorageError, StorageService, StoredFile};
