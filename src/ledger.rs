// src/ledger.rs
//! Durable record of identifiers that were fully processed

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::LedgerError;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// True iff `id` was recorded before
    async fn has(&self, id: &str) -> Result<bool, LedgerError>;

    /// Append `id`. Recording the same id twice is harmless.
    async fn record(&self, id: &str) -> Result<(), LedgerError> {
        self.record_all(&[id.to_string()]).await
    }

    /// Append every id of a finished wave in a single write.
    async fn record_all(&self, ids: &[String]) -> Result<(), LedgerError>;
}

/// Newline-delimited, append-only text file.
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    /// Open the ledger at `path`, creating an empty file if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| io_error(&path, source))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn has(&self, id: &str) -> Result<bool, LedgerError> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        Ok(content.lines().any(|line| line.trim() == id))
    }

    async fn record_all(&self, ids: &[String]) -> Result<(), LedgerError> {
        if ids.is_empty() {
            return Ok(());
        }
        let entries: String = ids.iter().map(|id| format!("{}\n", id)).collect();

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;

        file.write_all(entries.as_bytes())
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.sync_data()
            .await
            .map_err(|source| io_error(&self.path, source))?;

        debug!("Recorded {} entries in ledger", ids.len());
        Ok(())
    }
}
