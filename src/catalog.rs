// src/catalog.rs
//! Validation of model output and one-file-per-posting persistence

use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::core::FsOps;
use crate::error::CatalogError;
use crate::types::{JobCategory, JobPosting};
use crate::utils::record_stem;

/// Highest version suffix tried before a name collision becomes an error
const MAX_RECORD_VERSIONS: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedResults {
    pub postings: Vec<JobPosting>,
    pub rejected: Vec<RejectedRow>,
}

pub struct Cataloger {
    root: PathBuf,
}

impl Cataloger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn bucket_dir(&self, category: JobCategory) -> PathBuf {
        self.root.join(category.bucket())
    }

    pub async fn ensure_directories(&self) -> Result<(), CatalogError> {
        for category in JobCategory::ALL {
            let dir = self.bucket_dir(category);
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| io_error(&dir, source))?;
        }
        Ok(())
    }

    /// Validate the model's JSON answer row by row.
    ///
    /// Only a payload that is not an array of rows (or `{"jobs": [...]}`)
    /// fails as a whole; invalid rows are reported in `rejected`.
    pub fn parse(text: &str) -> Result<ParsedResults, CatalogError> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| CatalogError::Malformed(format!("invalid JSON: {}", e)))?;

        let rows = match value {
            Value::Array(rows) => rows,
            Value::Object(mut object) => match object.remove("jobs") {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(CatalogError::Malformed(
                        "expected a JSON array of postings".to_string(),
                    ))
                }
            },
            _ => {
                return Err(CatalogError::Malformed(
                    "expected a JSON array of postings".to_string(),
                ))
            }
        };

        let mut parsed = ParsedResults::default();
        for (index, row) in rows.into_iter().enumerate() {
            match serde_json::from_value::<JobPosting>(row) {
                Ok(posting) => parsed.postings.push(posting),
                Err(e) => {
                    warn!("Rejected result row {}: {}", index, e);
                    parsed.rejected.push(RejectedRow {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(parsed)
    }

    /// Write one indented JSON record per posting into its category bucket.
    /// Existing records are never overwritten; clashing names get a `_N` suffix.
    pub async fn catalog(&self, postings: &[JobPosting]) -> Result<Vec<PathBuf>, CatalogError> {
        let mut written = Vec::with_capacity(postings.len());
        for posting in postings {
            let path = self.write_record(posting).await?;
            info!(
                "Added {} job to repository: {} ({})",
                posting.category,
                posting.job_title,
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }

    async fn write_record(&self, posting: &JobPosting) -> Result<PathBuf, CatalogError> {
        let dir = self.bucket_dir(posting.category);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let content = serde_json::to_vec_pretty(posting)?;
        let stem = record_stem(&posting.published, &posting.job_title);

        for version in 1..=MAX_RECORD_VERSIONS {
            let file_name = if version == 1 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, version)
            };
            let path = dir.join(file_name);

            match FsOps::write_new(&path, &content).await {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(io_error(&path, source)),
            }
        }

        Err(CatalogError::Collision {
            path: dir.join(format!("{}.json", stem)),
        })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CatalogError {
    CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}
