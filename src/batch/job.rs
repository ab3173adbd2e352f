// src/batch/job.rs
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::types::BatchState;

/// Handle on one batch unit of work and its on-disk artifacts.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub(crate) id: String,
    pub(crate) state: BatchState,
    pub(crate) remote_id: Option<String>,
    pub(crate) request_path: PathBuf,
    pub(crate) object_path: PathBuf,
    pub(crate) response_path: PathBuf,
    pub(crate) submitted_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Provider-side batch id, known once submitted
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    pub fn object_path(&self) -> &Path {
        &self.object_path
    }

    pub fn response_path(&self) -> &Path {
        &self.response_path
    }

    /// When the provider accepted the batch, as reported in its snapshot
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }
}
