// src/batch/provider.rs
use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{BatchObject, CreateBatchRequest, FileObject};

/// Files/batches API of an LLM provider.
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Upload a JSONL request file for batch processing
    async fn upload_file(&self, file_name: &str, content: Vec<u8>)
        -> Result<FileObject, ProviderError>;

    async fn create_batch(&self, request: CreateBatchRequest)
        -> Result<BatchObject, ProviderError>;

    async fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ProviderError>;

    /// Raw content of an output file
    async fn file_content(&self, file_id: &str) -> Result<String, ProviderError>;
}
