//! Local filesystem state store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{Document, MonitorState, StateStore};

/// State documents stored as pretty-printed JSON under one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of a document.
    pub fn path(&self, document: Document) -> PathBuf {
        self.root_dir.join(document.file_name())
    }

    /// Write bytes atomically: temp file, flush, fsync, rename.
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, document: Document, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(&self.path(document), &bytes)
            .await
            .map_err(|e| AppError::persistence(document.file_name(), e))
    }

    /// Read a document. Missing files are empty; corrupt files are logged
    /// and treated as empty so the run re-initializes instead of failing.
    async fn read_json<T: DeserializeOwned + Default>(&self, document: Document) -> Result<T> {
        let path = self.path(document);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(AppError::Io(e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("Ignoring unreadable state file {:?}: {}", path, e);
                Ok(T::default())
            }
        }
    }
}

#[async_trait]
impl StateStore for LocalStorage {
    async fn load_state(&self) -> Result<MonitorState> {
        let state = MonitorState {
            baselines: self.read_json(Document::Baselines).await?,
            texts: self.read_json(Document::Texts).await?,
            failures: self.read_json(Document::Failures).await?,
            cooldowns: self.read_json(Document::Cooldowns).await?,
        };
        log::debug!(
            "Loaded state from {:?}: {} baselines, {} failure records",
            self.root_dir,
            state.baselines.len(),
            state.failures.len()
        );
        Ok(state)
    }

    async fn save(&self, state: &MonitorState, document: Document) -> Result<()> {
        match document {
            Document::Baselines => self.write_json(document, &state.baselines).await,
            Document::Texts => self.write_json(document, &state.texts).await,
            Document::Failures => self.write_json(document, &state.failures).await,
            Document::Cooldowns => self.write_json(document, &state.cooldowns).await,
        }
    }
}
