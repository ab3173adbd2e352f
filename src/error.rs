// src/error.rs
//! Error types for the batch pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::batch::{BatchState, BatchStatus};

/// Errors raised by the LLM provider's files/batches API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or rejected API key
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other non-2xx response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection failed, timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected response body
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors raised while driving one batch through its lifecycle.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch submission must contain at least one message")]
    EmptySubmission,

    #[error("Batch {0} was already submitted")]
    AlreadySubmitted(String),

    #[error("Batch {0} has not been submitted")]
    NotSubmitted(String),

    #[error("Batch {id} is not ready for download (state: {state})")]
    NotReady { id: String, state: BatchState },

    #[error("Missing local state for batch {id}: {}", .path.display())]
    MissingState { id: String, path: PathBuf },

    #[error("Corrupt local state for batch {id}: {reason}")]
    CorruptState { id: String, reason: String },

    #[error("Batch {id} ended with status {status}")]
    Terminal { id: String, status: BatchStatus },

    #[error("Batch {id} still {state} after {attempts} polls")]
    PollTimeout {
        id: String,
        state: BatchState,
        attempts: u32,
    },

    #[error("Malformed batch output: {0}")]
    MalformedOutput(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize batch data: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while validating and persisting LLM results.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The payload is not a JSON array of postings at all
    #[error("Malformed result payload: {0}")]
    Malformed(String),

    #[error("None of the {rejected} result rows passed validation")]
    NoValidRows { rejected: usize },

    #[error("Too many records named like {}", .path.display())]
    Collision { path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize posting: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Anything that can go wrong while processing a wave.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl AnalyzerError {
    /// Fatal errors stop the whole run; the rest only abort the current wave.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Ledger(_)
                | AnalyzerError::Batch(BatchError::MissingState { .. })
                | AnalyzerError::Batch(BatchError::CorruptState { .. })
        )
    }
}
