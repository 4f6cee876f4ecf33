//! Pipeline Models
//!
//! Data structures passed through the compression pipeline.

pub mod compress;
pub mod watermark;
pub mod progress;

pub use compress::*;
pub use watermark::*;
pub use progress::*;
