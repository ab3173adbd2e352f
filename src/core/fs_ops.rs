// src/core/fs_ops.rs
//! File system helpers shared by the batch, ledger and catalog stores

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub struct FsOps;

impl FsOps {
    /// Ensure directory exists
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            info!("Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Create an empty file (and its parent directory) unless it already exists
    pub async fn touch_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        Ok(())
    }

    /// Write `content` to a file that must not exist yet.
    /// Fails with `ErrorKind::AlreadyExists` instead of overwriting.
    pub async fn write_new(path: &Path, content: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;
        debug!("Written file: {}", path.display());
        Ok(())
    }

    /// Remove a file, treating "already gone" as success.
    /// Returns whether a file was actually removed.
    pub async fn remove_file_if_exists(path: &Path) -> std::io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed file: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
