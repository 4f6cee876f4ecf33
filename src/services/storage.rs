//! Storage Service
//!
//! Local filesystem sink for compressed blobs. The pipeline itself never
//! persists anything; callers hand finished results to this service.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use crate::models::{Blob, CompressResult};

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Storage service for compressed images
pub struct StorageService {
    /// Base uploads directory
    uploads_dir: PathBuf,
    /// Base URL for uploads
    base_url: String,
    /// Organize by date
    organize_by_date: bool,
}

impl StorageService {
    /// Create a new storage service
    pub fn new(uploads_dir: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            uploads_dir,
            base_url: base_url.into(),
            organize_by_date: true,
        }
    }

    /// Store files under `YYYY/MM/`
    pub fn set_organize_by_date(&mut self, enabled: bool) {
        self.organize_by_date = enabled;
    }

    /// Initialize storage (create directories)
    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.uploads_dir).await?;
        Ok(())
    }

    /// Store a blob under a unique name derived from `file_name`
    pub async fn store(&self, blob: &Blob, file_name: &str) -> Result<StoredFile, StorageError> {
        let hash = hex::encode(Sha256::digest(&blob.data));

        let relative_path = self.generate_path(file_name);
        let full_path = self.uploads_dir.join(&relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, &blob.data).await?;

        tracing::debug!(path = %relative_path, bytes = blob.size(), "Stored image");

        Ok(StoredFile {
            url: self.url_for(&relative_path),
            path: relative_path,
            size: blob.size(),
            hash,
            mime_type: blob.mime_type.clone(),
        })
    }

    /// Store the output of a compression
    pub async fn store_result(&self, result: &CompressResult) -> Result<StoredFile, StorageError> {
        self.store(&result.blob, &result.file_name).await
    }

    /// Read file contents
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path)?;

        if !full_path.exists() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        Ok(fs::read(&full_path).await?)
    }

    /// Delete a file
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(path)?;

        if full_path.exists() {
            fs::remove_file(&full_path).await?;
        }

        Ok(())
    }

    /// Check if file exists
    pub async fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    /// Get URL for a path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Get uploads directory
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Generate unique filename
    pub fn generate_unique_filename(&self, original: &str) -> String {
        let sanitized = sanitize_filename(original);
        let path = Path::new(&sanitized);

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
        let id = Uuid::now_v7().simple().to_string();

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}-{}.{}", stem, &id[..12], ext),
            None => format!("{}-{}", stem, &id[..12]),
        }
    }

    /// Generate path based on organization settings
    fn generate_path(&self, file_name: &str) -> String {
        let unique_name = self.generate_unique_filename(file_name);

        if self.organize_by_date {
            let now = Utc::now();
            format!("{}/{}/{}", now.format("%Y"), now.format("%m"), unique_name)
        } else {
            unique_name
        }
    }

    /// Relative path inside the uploads directory; rejects escapes
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));

        if escapes {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.uploads_dir.join(relative))
    }
}

/// Stored file information
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Relative path
    pub path: String,
    /// Public URL
    pub url: String,
    /// File size in bytes
    pub size: u64,
    /// SHA-256 of the content
    pub hash: String,
    pub mime_type: String,
}

/// Lowercase file name with anything outside `[a-z0-9._-]` replaced by `-`
pub fn sanitize_filename(filename: &str) -> String {
    let re = regex::Regex::new(r"[^a-zA-Z0-9._-]").expect("static pattern");
    let path = Path::new(filename);

    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    let sanitized = re.replace_all(name, "-").to_lowercase();

    if ext.is_empty() {
        sanitized
    } else {
        format!("{}.{}", sanitized, ext.to_lowercase())
    }
}
