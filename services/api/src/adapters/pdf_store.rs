//! services/api/src/adapters/pdf_store.rs
//!
//! Stores uploaded PDFs on the local filesystem under a base directory.

use async_trait::async_trait;
use review_core::ports::{PdfStorageService, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Clone)]
pub struct LocalPdfStorage {
    root: PathBuf,
}

impl LocalPdfStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a storage name such as `pdf/ab12.pdf` below the root. Only
    /// plain relative names are accepted.
    fn resolve(&self, name: &str) -> PortResult<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(PortError::NotFound(format!("PDF {} not found", name)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PdfStorageService for LocalPdfStorage {
    async fn put(&self, name: &str, data: &[u8]) -> PortResult<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let write_failed = |e: std::io::Error| PortError::Unexpected(format!("cannot write {}: {}", path.display(), e));
        let mut file = File::create(&path).await.map_err(write_failed)?;
        file.write_all(data).await.map_err(write_failed)?;
        // The record that names this file is committed right after; flush to disk first.
        file.sync_all().await.map_err(write_failed)?;
        debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, name: &str) -> PortResult<Vec<u8>> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PortError::NotFound(format!("PDF {} not found", name)),
            _ => PortError::Unexpected(format!("cannot read {}: {}", path.display(), e)),
        })
    }

    async fn delete(&self, name: &str) -> PortResult<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("cannot delete {}: {}", path.display(), e))),
        }
    }
}
