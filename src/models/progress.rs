//! Batch Progress Models

use serde::Serialize;

use super::compress::{savings_percent, CompressResult};

/// Position of a running batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressionProgress {
    /// 1-based index of the file being processed
    pub current: usize,
    pub total: usize,
    pub file_name: String,
    /// Whole percent
    pub percentage: u32,
}

impl CompressionProgress {
    pub fn new(index: usize, total: usize, file_name: impl Into<String>) -> Self {
        let current = index + 1;
        let percentage = if total == 0 {
            0
        } else {
            (current as f64 / total as f64 * 100.0).round() as u32
        };

        Self {
            current,
            total,
            file_name: file_name.into(),
            percentage,
        }
    }
}

/// Totals for a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub total_original_size: u64,
    pub total_new_size: u64,
    /// Whole percent, never negative
    pub total_savings: u32,
    pub files_processed: usize,
}

impl CompressionStats {
    pub fn from_results(results: &[CompressResult]) -> Self {
        let total_original_size: u64 = results.iter().map(|r| r.original_size).sum();
        let total_new_size: u64 = results.iter().map(|r| r.new_size).sum();

        Self {
            total_original_size,
            total_new_size,
            total_savings: savings_percent(total_original_size, total_new_size),
            files_processed: results.len(),
        }
    }
}
