//! Image Pipeline Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{Blob, CompressResult, SourceFile};
use crate::services::{
    apply_watermark, BatchCompressor, CompressError, HttpImageLoader, ImageCompressor,
    PreloadQueue, StorageError, StorageService, StoredFile, WatermarkError,
};
use crate::settings::PipelineSettings;

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Compression error: {0}")]
    Compress(#[from] CompressError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Services wired from one set of settings
pub struct ImagePipeline {
    /// Pipeline settings
    settings: PipelineSettings,

    /// Services
    compressor: Arc<ImageCompressor>,
    batch: Arc<BatchCompressor>,
    preloader: PreloadQueue,
    storage: Arc<StorageService>,
}

impl ImagePipeline {
    /// Create a pipeline with default settings
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    /// Create with custom settings
    pub fn with_settings(settings: PipelineSettings) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        let mut compressor = ImageCompressor::new();
        compressor.set_max_input_size(settings.max_input_size);
        compressor.set_client(client.clone());
        let compressor = Arc::new(compressor);

        let batch = Arc::new(BatchCompressor::new(Arc::clone(&compressor)));
        let preloader = PreloadQueue::new(
            Arc::new(HttpImageLoader::new(client)),
            settings.preload_max_concurrent,
        );

        let mut storage = StorageService::new(
            PathBuf::from(&settings.storage_path),
            settings.base_url.clone(),
        );
        storage.set_organize_by_date(settings.organize_by_date);

        Self {
            settings,
            compressor,
            batch,
            preloader,
            storage: Arc::new(storage),
        }
    }

    /// Create the storage directory
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.storage.init().await
    }

    /// Get pipeline settings
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Compress one file with the configured options
    pub async fn compress(&self, file: &SourceFile) -> Result<CompressResult, CompressError> {
        self.compressor.compress(file, &self.settings.compress_options()).await
    }

    /// Compress files sequentially; failures keep their original bytes
    pub async fn compress_all(&self, files: Vec<SourceFile>) -> Vec<CompressResult> {
        self.batch
            .compress_multiple(files, &self.settings.compress_options())
            .await
    }

    /// Convert onto the configured fixed canvas
    pub async fn convert(&self, file: &SourceFile) -> Result<CompressResult, CompressError> {
        self.compressor
            .convert_fixed(file, &self.settings.convert_options())
            .await
    }

    /// Fetch a remote image and compress it
    pub async fn compress_url(&self, url: &str) -> Result<CompressResult, CompressError> {
        self.compressor
            .compress_url(url, &self.settings.compress_options())
            .await
    }

    /// Watermark an encoded blob with the configured watermark
    pub async fn watermark(&self, blob: Blob) -> Result<Blob, WatermarkError> {
        apply_watermark(blob, &self.settings.watermark).await
    }

    /// Compress one file and store the output
    pub async fn compress_and_store(
        &self,
        file: &SourceFile,
    ) -> Result<(CompressResult, StoredFile), PipelineError> {
        let result = self.compress(file).await?;
        let stored = self.storage.store_result(&result).await?;
        Ok((result, stored))
    }

    /// Queue gallery images for prefetching
    pub fn preload_gallery<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloader.preload_multiple(urls)
    }

    // Service accessors
    pub fn compressor(&self) -> &Arc<ImageCompressor> {
        &self.compressor
    }

    pub fn batch(&self) -> &Arc<BatchCompressor> {
        &self.batch
    }

    pub fn preloader(&self) -> &PreloadQueue {
        &self.preloader
    }

    pub fn storage(&self) -> &Arc<StorageService> {
        &self.storage
    }
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new()
    }
}
