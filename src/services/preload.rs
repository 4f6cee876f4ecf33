//! Preload Queue
//!
//! Bounded-concurrency image prefetcher for galleries. URLs are started in
//! FIFO order with at most `max_concurrent` loads in flight; every finished
//! load, successful or not, frees a slot and starts the next queued URL.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

/// Default number of simultaneous loads
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Preload error
#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not an image: {0}")]
    Decode(String),
}

/// Fetches one image
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), PreloadError>;
}

/// Loader that downloads the image and checks that it decodes
pub struct HttpImageLoader {
    client: reqwest::Client,
}

impl HttpImageLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpImageLoader {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<(), PreloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PreloadError::Network(e.to_string()))?;

        let data = response
            .bytes()
            .await
            .map_err(|e| PreloadError::Network(e.to_string()))?;

        image::ImageReader::new(std::io::Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| PreloadError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| PreloadError::Decode(e.to_string()))?;

        Ok(())
    }
}

/// Counts of a preload queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadStats {
    pub queued: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    loading: HashSet<String>,
    loaded: HashSet<String>,
    failed: HashSet<String>,
}

impl QueueState {
    fn knows(&self, url: &str) -> bool {
        self.loaded.contains(url) || self.loading.contains(url) || self.queue.iter().any(|u| u == url)
    }

    fn pending(&self) -> usize {
        self.queue.len() + self.loading.len()
    }
}

struct Inner {
    loader: Arc<dyn ImageLoader>,
    max_concurrent: usize,
    state: Mutex<QueueState>,
    /// Queued plus in-flight URLs
    pending: watch::Sender<usize>,
}

/// Bounded-concurrency preloader.
///
/// Must be used from within a tokio runtime; loads run as spawned tasks.
#[derive(Clone)]
pub struct PreloadQueue {
    inner: Arc<Inner>,
}

impl PreloadQueue {
    /// Create a queue over `loader`. `max_concurrent` of zero is treated as one.
    pub fn new(loader: Arc<dyn ImageLoader>, max_concurrent: usize) -> Self {
        let (pending, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                loader,
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState::default()),
                pending,
            }),
        }
    }

    /// HTTP loader with the default concurrency
    pub fn http() -> Self {
        Self::new(Arc::new(HttpImageLoader::default()), DEFAULT_MAX_CONCURRENT)
    }

    /// Enqueue `url`. Returns false if it is already queued, loading or loaded.
    pub fn preload(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        {
            let mut state = self.lock();
            if state.knows(&url) {
                return false;
            }
            state.failed.remove(&url);
            state.queue.push_back(url);
        }

        self.pump();
        true
    }

    /// Enqueue several URLs in order; returns how many were new
    pub fn preload_multiple<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .map(|url| self.preload(url))
            .filter(|queued| *queued)
            .count()
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.lock().loaded.contains(url)
    }

    pub fn is_loading(&self, url: &str) -> bool {
        self.lock().loading.contains(url)
    }

    pub fn has_failed(&self, url: &str) -> bool {
        self.lock().failed.contains(url)
    }

    pub fn stats(&self) -> PreloadStats {
        let state = self.lock();
        PreloadStats {
            queued: state.queue.len(),
            loading: state.loading.len(),
            loaded: state.loaded.len(),
            failed: state.failed.len(),
        }
    }

    /// Wait until nothing is queued or loading
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.pending.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the sets half-updated
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start queued URLs while slots are free
    fn pump(&self) {
        let mut started = Vec::new();
        {
            let mut state = self.lock();
            while state.loading.len() < self.inner.max_concurrent {
                let Some(url) = state.queue.pop_front() else {
                    break;
                };
                state.loading.insert(url.clone());
                started.push(url);
            }
            self.inner.pending.send_replace(state.pending());
        }

        for url in started {
            let queue = self.clone();
            tokio::spawn(async move {
                let result = queue.inner.loader.load(&url).await;
                queue.finish(url, result);
            });
        }
    }

    fn finish(&self, url: String, result: Result<(), PreloadError>) {
        {
            let mut state = self.lock();
            state.loading.remove(&url);
            match result {
                Ok(()) => {
                    tracing::debug!(url = %url, "Preloaded image");
                    state.loaded.insert(url);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Image preload failed");
                    state.failed.insert(url);
                }
            }
        }

        self.pump();
    }
}
