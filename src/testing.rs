// src/testing.rs
//! In-memory provider and text source used by unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::batch::{BatchPaths, BatchProvider};
use crate::error::ProviderError;
use crate::scraping::TextSource;
use crate::types::{BatchObject, BatchStatus, CreateBatchRequest, FileObject};

/// `created_at` stamped on every fake batch object
pub const FAKE_CREATED_AT: i64 = 1_738_540_800;

/// Scripted provider: every `retrieve_batch` pops the next status,
/// repeating the last one once the script is exhausted.
pub struct FakeProvider {
    statuses: Mutex<VecDeque<BatchStatus>>,
    last_status: Mutex<BatchStatus>,
    output: String,
    reject_create: bool,
    omit_output_file: bool,
    uploads: Mutex<Vec<String>>,
    created: AtomicUsize,
    retrievals: AtomicUsize,
}

impl FakeProvider {
    pub fn new(statuses: Vec<BatchStatus>, output: String) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            last_status: Mutex::new(BatchStatus::Validating),
            output,
            reject_create: false,
            omit_output_file: false,
            uploads: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            retrievals: AtomicUsize::new(0),
        }
    }

    pub fn completing(output: String) -> Self {
        Self::new(vec![BatchStatus::Completed], output)
    }

    pub fn rejecting_create(mut self) -> Self {
        self.reject_create = true;
        self
    }

    /// Completed batches come back without an `output_file_id`
    pub fn without_output_file(mut self) -> Self {
        self.omit_output_file = true;
        self
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn batches_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

fn batch_object(id: &str, status: BatchStatus, with_output: bool) -> BatchObject {
    let output_file_id = (with_output && status == BatchStatus::Completed)
        .then(|| format!("file-out-{}", id));
    BatchObject {
        id: id.to_string(),
        status,
        output_file_id,
        error_file_id: None,
        created_at: Some(FAKE_CREATED_AT),
        extra: serde_json::Map::new(),
    }
}

#[async_trait]
impl BatchProvider for FakeProvider {
    async fn upload_file(
        &self,
        _file_name: &str,
        content: Vec<u8>,
    ) -> Result<FileObject, ProviderError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(String::from_utf8_lossy(&content).into_owned());
        Ok(FileObject {
            id: format!("file-{}", uploads.len()),
            extra: serde_json::Map::new(),
        })
    }

    async fn create_batch(
        &self,
        _request: CreateBatchRequest,
    ) -> Result<BatchObject, ProviderError> {
        if self.reject_create {
            return Err(ProviderError::RateLimit("too many batches".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(batch_object(
            &format!("batch_{}", n),
            BatchStatus::Validating,
            !self.omit_output_file,
        ))
    }

    async fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ProviderError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last_status.lock().unwrap();
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(batch_object(batch_id, (*last).clone(), !self.omit_output_file))
    }

    async fn file_content(&self, _file_id: &str) -> Result<String, ProviderError> {
        Ok(self.output.clone())
    }
}

/// Text source backed by a map; unknown uris fail like a network error.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn with_page(mut self, uri: &str, text: &str) -> Self {
        self.pages.insert(uri.to_string(), text.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextSource for FakeSource {
    async fn fetch_text(&self, uri: &str) -> anyhow::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP error: 503 Service Unavailable"))
    }
}

pub fn batch_paths(root: &Path) -> BatchPaths {
    BatchPaths {
        request_dir: root.join("batch").join("request"),
        object_dir: root.join("batch").join("object"),
        response_dir: root.join("batch").join("response"),
    }
}

pub fn posting(category: &str, title: &str, uri: &str) -> Value {
    json!({
        "type": category,
        "published": "03-02-2025",
        "deadline": "Not mentioned",
        "contractType": "Full-time",
        "start": "Not mentioned",
        "language": "English",
        "jobTitle": title,
        "companyName": "Acme",
        "location": "Copenhagen",
        "description": "Summary",
        "requirements": ["Degree"],
        "keySkills": ["Rust", "SQL"],
        "contacts": "Not mentioned",
        "cvPhotoRequired": "Not mentioned",
        "applyUri": uri
    })
}

/// Model answer wrapped in a ```json fence, as the model usually replies
pub fn fenced(payload: &Value) -> String {
    format!(
        "```json\n{}\n```",
        serde_json::to_string_pretty(payload).unwrap()
    )
}

/// One JSONL line of a batch output file carrying `content`
pub fn provider_output(content: &str) -> String {
    let line = json!({
        "id": "batch_req_1",
        "custom_id": "ignored",
        "response": {
            "status_code": 200,
            "request_id": "req_1",
            "body": {
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": content}}
                ]
            }
        },
        "error": null
    });
    format!("{}\n", line)
}
