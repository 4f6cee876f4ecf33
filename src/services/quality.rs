//! Adaptive quality selection

const KB: u64 = 1024;

/// Quality tier for an original of `file_size` bytes.
///
/// Larger originals take more aggressive compression.
pub fn adaptive_quality(file_size: u64) -> u8 {
    match file_size {
        s if s < 100 * KB => 95,
        s if s < 500 * KB => 90,
        s if s < 2048 * KB => 85,
        _ => 75,
    }
}
