//! Durable storage for the message buffers.
//!
//! The whole store is saved as a single JSON document mapping chat id to the
//! ordered message list. Writes go to a sibling temp file that is then renamed
//! over the target, so a crash mid-write leaves the previous document intact.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{ChatId, Message};
use crate::errors::BotError;

/// Point-in-time image of every buffer, oldest message first.
pub type StoreImage = BTreeMap<ChatId, Vec<Message>>;

#[async_trait]
pub trait BufferPersistence: Send + Sync {
    /// Load the last saved image. A missing document is an empty store.
    async fn load(&self) -> Result<StoreImage, BotError>;

    /// Replace the saved image. Returns only once the write is complete.
    async fn save(&self, image: &StoreImage) -> Result<(), BotError>;
}

/// JSON document on the local filesystem.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tldr_bot_data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BufferPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<StoreImage, BotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No buffer file at {}, starting with an empty store",
                    self.path.display()
                );
                return Ok(StoreImage::new());
            }
            Err(e) => {
                return Err(BotError::StorageError(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreImage::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            BotError::StorageError(format!("parse {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, image: &StoreImage) -> Result<(), BotError> {
        let body = serde_json::to_vec(image)
            .map_err(|e| BotError::StorageError(format!("serialize buffers: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        write_synced(&tmp, &body).await.map_err(|e| {
            BotError::StorageError(format!("write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            BotError::StorageError(format!("rename into {}: {}", self.path.display(), e))
        })?;

        debug!(
            "Persisted {} chat buffers ({} bytes) to {}",
            image.len(),
            body.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Write `body` to `path` and flush it to the device before the caller
/// renames it into place.
async fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(body).await?;
    file.sync_all().await
}

/// Keeps the saved image in memory. Used by tests and ephemeral deployments;
/// can be switched into a failing mode to exercise persistence errors.
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<StoreImage>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(image: StoreImage) -> Self {
        Self {
            saved: Mutex::new(image),
            ..Self::default()
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn saved_image(&self) -> StoreImage {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl BufferPersistence for MemoryPersistence {
    async fn load(&self) -> Result<StoreImage, BotError> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, image: &StoreImage) -> Result<(), BotError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BotError::StorageError("simulated write failure".to_string()));
        }
        *self.saved.lock().await = image.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
