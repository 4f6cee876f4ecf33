//! Batch Orchestrator
//!
//! Runs the compressor over a list of files strictly one at a time, publishing
//! progress and final statistics through a watch channel. A file that fails
//! is kept as-is and the batch carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::models::{
    CompressOptions, CompressResult, CompressionProgress, CompressionStats, SourceFile,
};
use super::compressor::ImageCompressor;

/// Observable batch state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchState {
    pub is_compressing: bool,
    /// File currently being processed, or the last one of a finished batch
    pub progress: Option<CompressionProgress>,
    /// Totals of the last finished batch
    pub stats: Option<CompressionStats>,
}

/// Requests that a running batch stop before its next file
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequential batch compressor
pub struct BatchCompressor {
    compressor: Arc<ImageCompressor>,
    state: watch::Sender<BatchState>,
    cancel: CancelHandle,
    /// One batch at a time
    running: Mutex<()>,
}

impl BatchCompressor {
    /// Create a new batch compressor
    pub fn new(compressor: Arc<ImageCompressor>) -> Self {
        let (state, _) = watch::channel(BatchState::default());

        Self {
            compressor,
            state,
            cancel: CancelHandle(Arc::new(AtomicBool::new(false))),
            running: Mutex::new(()),
        }
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> BatchState {
        self.state.borrow().clone()
    }

    pub fn is_compressing(&self) -> bool {
        self.state.borrow().is_compressing
    }

    pub fn progress(&self) -> Option<CompressionProgress> {
        self.state.borrow().progress.clone()
    }

    pub fn stats(&self) -> Option<CompressionStats> {
        self.state.borrow().stats.clone()
    }

    /// Stop the running batch before its next file. The file in flight finishes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Compress `files` in order.
    ///
    /// Returns one result per processed file, index-aligned with `files`.
    /// Failed files come back as [`CompressResult::fallback`]. After a
    /// cancellation the result holds only the files processed so far.
    pub async fn compress_multiple(
        &self,
        files: Vec<SourceFile>,
        options: &CompressOptions,
    ) -> Vec<CompressResult> {
        let _running = self.running.lock().await;
        self.cancel.0.store(false, Ordering::SeqCst);

        let total = files.len();
        self.state.send_modify(|state| {
            state.is_compressing = true;
            state.progress = None;
        });
        let _active = ActiveBatch(&self.state);

        let mut results = Vec::with_capacity(total);

        for (index, file) in files.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(processed = index, total, "Batch cancelled");
                break;
            }

            let progress = CompressionProgress::new(index, total, file.name.clone());
            self.state.send_modify(|state| state.progress = Some(progress));

            let file = Arc::new(file);
            let outcome = self.compressor.compress_shared(Arc::clone(&file), options).await;
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Compression failed, keeping original");
                    CompressResult::fallback(Arc::unwrap_or_clone(file))
                }
            };

            results.push(result);
        }

        let stats = CompressionStats::from_results(&results);
        tracing::info!(
            files = stats.files_processed,
            original = stats.total_original_size,
            compressed = stats.total_new_size,
            savings = stats.total_savings,
            "Batch finished"
        );

        self.state.send_modify(|state| {
            state.is_compressing = false;
            state.stats = Some(stats);
        });

        results
    }
}

/// Clears `is_compressing` if a batch future is dropped part-way
struct ActiveBatch<'a>(&'a watch::Sender<BatchState>);

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| std::mem::replace(&mut state.is_compressing, false));
    }
}
