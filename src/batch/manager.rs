// src/batch/manager.rs
//! Submit → poll → fetch → cleanup lifecycle of a single batch

use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::BatchJob;
use super::prompt::system_message;
use super::BatchProvider;
use crate::core::config_manager::{PathsConfig, ProviderConfig};
use crate::core::FsOps;
use crate::error::BatchError;
use crate::types::batch::CHAT_COMPLETIONS_ENDPOINT;
use crate::types::{
    BatchObject, BatchRequestSpec, BatchState, BatchStatus, CreateBatchRequest, Message,
};
use crate::utils::strip_header_trailer;

const BATCH_DESCRIPTION: &str = "job analysis batch";

/// Directories holding request, object-snapshot and response artifacts
#[derive(Debug, Clone)]
pub struct BatchPaths {
    pub request_dir: PathBuf,
    pub object_dir: PathBuf,
    pub response_dir: PathBuf,
}

impl From<&PathsConfig> for BatchPaths {
    fn from(paths: &PathsConfig) -> Self {
        Self {
            request_dir: paths.batch_request_dir.clone(),
            object_dir: paths.batch_object_dir.clone(),
            response_dir: paths.batch_response_dir.clone(),
        }
    }
}

pub struct BatchManager {
    provider: Arc<dyn BatchProvider>,
    paths: BatchPaths,
    model: String,
    max_tokens: u32,
    completion_window: String,
}

impl BatchManager {
    pub fn new(provider: Arc<dyn BatchProvider>, paths: BatchPaths, config: &ProviderConfig) -> Self {
        Self {
            provider,
            paths,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            completion_window: config.completion_window.clone(),
        }
    }

    pub fn object_dir(&self) -> &Path {
        &self.paths.object_dir
    }

    fn request_file_name(id: &str) -> String {
        format!("batch_{}.jsonl", id)
    }

    fn job_handle(&self, id: &str, state: BatchState) -> BatchJob {
        BatchJob {
            id: id.to_string(),
            state,
            remote_id: None,
            request_path: self.paths.request_dir.join(Self::request_file_name(id)),
            object_path: self.paths.object_dir.join(format!("batch_{}.json", id)),
            response_path: self
                .paths
                .response_dir
                .join(format!("batch_{}_response.json", id)),
            submitted_at: None,
        }
    }

    /// Build the request for `messages` behind the fixed system prompt and
    /// write it to a fresh request artifact.
    pub async fn create(&self, messages: Vec<Message>) -> Result<BatchJob, BatchError> {
        if messages.is_empty() {
            return Err(BatchError::EmptySubmission);
        }

        let id = Uuid::new_v4().simple().to_string();
        let user_messages = messages.len();
        let mut all_messages = Vec::with_capacity(user_messages + 1);
        all_messages.push(system_message());
        all_messages.extend(messages);

        let request = BatchRequestSpec::from_messages(&id, all_messages, &self.model, self.max_tokens);
        let line = request.to_jsonl()?;

        let job = self.job_handle(&id, BatchState::Created);
        FsOps::write_new(&job.request_path, line.as_bytes())
            .await
            .map_err(|source| io_error(&job.request_path, source))?;

        info!(
            "Created batch {} with {} job descriptions",
            job.id, user_messages
        );
        Ok(job)
    }

    /// Upload the request artifact, create the remote batch and persist its
    /// snapshot. Creates a billable remote resource; not retried here.
    pub async fn submit(&self, job: &mut BatchJob) -> Result<(), BatchError> {
        if job.state != BatchState::Created {
            return Err(BatchError::AlreadySubmitted(job.id.clone()));
        }

        let content = match fs::read(&job.request_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BatchError::MissingState {
                    id: job.id.clone(),
                    path: job.request_path.clone(),
                })
            }
            Err(e) => return Err(io_error(&job.request_path, e)),
        };

        let file_object = self
            .provider
            .upload_file(&Self::request_file_name(&job.id), content)
            .await?;

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "description".to_string(),
            Value::String(BATCH_DESCRIPTION.to_string()),
        );
        let batch = self
            .provider
            .create_batch(CreateBatchRequest {
                input_file_id: file_object.id,
                endpoint: CHAT_COMPLETIONS_ENDPOINT.to_string(),
                completion_window: self.completion_window.clone(),
                metadata,
            })
            .await?;

        if let Err(e) = self.save_snapshot(job, &batch).await {
            error!(
                "Remote batch {} was created but its state could not be saved locally",
                batch.id
            );
            return Err(e);
        }

        job.remote_id = Some(batch.id.clone());
        job.state = BatchState::Submitted;
        job.submitted_at = batch.created_at_utc();
        info!("Submitted batch {} as remote batch {}", job.id, batch.id);
        Ok(())
    }

    /// Refresh the local snapshot from the provider.
    ///
    /// Returns `true` once the batch is completed. failed/expired/cancelled
    /// purge the local artifacts and return `BatchError::Terminal`.
    pub async fn poll(&self, job: &mut BatchJob) -> Result<bool, BatchError> {
        if job.state == BatchState::Created {
            return Err(BatchError::NotSubmitted(job.id.clone()));
        }

        let snapshot = self.load_snapshot(job).await?;
        let batch = self.provider.retrieve_batch(&snapshot.id).await?;

        if batch.status.is_terminal_failure() {
            self.cleanup(job).await?;
            job.state = BatchState::from(&batch.status);
            warn!("Batch {} ended remotely with status {}", job.id, batch.status);
            return Err(BatchError::Terminal {
                id: job.id.clone(),
                status: batch.status,
            });
        }

        self.save_snapshot(job, &batch).await?;
        job.state = BatchState::from(&batch.status);
        debug!("Batch {} status: {}", job.id, batch.status);

        Ok(batch.status == BatchStatus::Completed)
    }

    /// Poll until completed, sleeping `interval` between attempts.
    /// Gives up after `max_attempts` polls, leaving artifacts for `resume`.
    pub async fn wait_for_completion(
        &self,
        job: &mut BatchJob,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<(), BatchError> {
        for attempt in 1..=max_attempts {
            if self.poll(job).await? {
                info!("Batch {} completed after {} polls", job.id, attempt);
                return Ok(());
            }

            info!(
                "Batch {} is {} (poll {}/{})",
                job.id, job.state, attempt, max_attempts
            );
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        let submitted = job
            .submitted_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "an unknown time".to_string());
        warn!(
            "Giving up on batch {} after {} polls; the remote batch submitted at {} keeps running",
            job.id, max_attempts, submitted
        );
        Err(BatchError::PollTimeout {
            id: job.id.clone(),
            state: job.state,
            attempts: max_attempts,
        })
    }

    /// Download the output of a completed batch, strip the header and trailer
    /// lines around the payload, persist it and purge the request/object
    /// artifacts. Output that cannot be used purges the artifacts as well,
    /// since fetching it again would give the same answer.
    pub async fn fetch_results(&self, job: &mut BatchJob) -> Result<String, BatchError> {
        let snapshot = self.load_snapshot(job).await?;
        if job.state != BatchState::Completed {
            return Err(BatchError::NotReady {
                id: job.id.clone(),
                state: job.state,
            });
        }

        let batch = self.provider.retrieve_batch(&snapshot.id).await?;
        let Some(output_file_id) = batch.output_file_id.as_deref() else {
            let err = BatchError::MalformedOutput(format!(
                "batch {} completed without an output file",
                batch.id
            ));
            return Err(self.discard(job, err).await);
        };

        let raw = self.provider.file_content(output_file_id).await?;
        let content = match extract_message_content(&raw) {
            Ok(content) => content,
            Err(e) => return Err(self.discard(job, e).await),
        };
        let cleaned = strip_header_trailer(&content);

        if let Some(parent) = job.response_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        fs::write(&job.response_path, &cleaned)
            .await
            .map_err(|source| io_error(&job.response_path, source))?;
        info!(
            "Saved results of batch {} to {}",
            job.id,
            job.response_path.display()
        );

        self.cleanup(job).await?;
        Ok(cleaned)
    }

    /// Rebuild a handle for a batch submitted by an earlier process.
    pub async fn resume(&self, id: &str) -> Result<BatchJob, BatchError> {
        let mut job = self.job_handle(id, BatchState::Submitted);
        let snapshot = self.load_snapshot(&job).await?;

        job.remote_id = Some(snapshot.id.clone());
        job.state = BatchState::from(&snapshot.status);
        job.submitted_at = snapshot.created_at_utc();
        info!(
            "Resumed batch {} (remote {}, last seen {})",
            id, snapshot.id, snapshot.status
        );
        Ok(job)
    }

    /// Batches whose snapshot is still on disk: submitted by an earlier run
    /// and neither downloaded nor purged since.
    pub async fn pending(&self) -> Result<Vec<BatchJob>, BatchError> {
        let dir = &self.paths.object_dir;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| io_error(dir, source))?
        {
            let file_name = entry.file_name();
            let id = file_name
                .to_str()
                .and_then(|name| name.strip_prefix("batch_"))
                .and_then(|name| name.strip_suffix(".json"));
            if let Some(id) = id {
                ids.push(id.to_string());
            }
        }
        ids.sort();

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            jobs.push(self.resume(&id).await?);
        }
        Ok(jobs)
    }

    /// Messages of the request artifact, system prompt included
    pub async fn request_messages(&self, job: &BatchJob) -> Result<Vec<Message>, BatchError> {
        let content = match fs::read_to_string(&job.request_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BatchError::MissingState {
                    id: job.id.clone(),
                    path: job.request_path.clone(),
                })
            }
            Err(e) => return Err(io_error(&job.request_path, e)),
        };

        let line = content.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
        let request: BatchRequestSpec =
            serde_json::from_str(line).map_err(|e| BatchError::CorruptState {
                id: job.id.clone(),
                reason: format!("unreadable request: {}", e),
            })?;
        Ok(request.body.messages)
    }

    async fn discard(&self, job: &BatchJob, err: BatchError) -> BatchError {
        error!("Discarding output of batch {}: {}", job.id, err);
        match self.cleanup(job).await {
            Ok(()) => err,
            Err(cleanup_err) => cleanup_err,
        }
    }

    async fn load_snapshot(&self, job: &BatchJob) -> Result<BatchObject, BatchError> {
        let content = match fs::read_to_string(&job.object_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BatchError::MissingState {
                    id: job.id.clone(),
                    path: job.object_path.clone(),
                })
            }
            Err(e) => return Err(io_error(&job.object_path, e)),
        };

        serde_json::from_str(&content).map_err(|e| BatchError::CorruptState {
            id: job.id.clone(),
            reason: e.to_string(),
        })
    }

    async fn save_snapshot(&self, job: &BatchJob, batch: &BatchObject) -> Result<(), BatchError> {
        if let Some(parent) = job.object_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let content = serde_json::to_string_pretty(batch)?;
        fs::write(&job.object_path, content)
            .await
            .map_err(|source| io_error(&job.object_path, source))
    }

    async fn cleanup(&self, job: &BatchJob) -> Result<(), BatchError> {
        for path in [&job.request_path, &job.object_path] {
            FsOps::remove_file_if_exists(path)
                .await
                .map_err(|source| io_error(path, source))?;
        }
        debug!("Cleaned up request and object files of batch {}", job.id);
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BatchError {
    BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Pull the assistant message out of the first record of a batch output file.
pub fn extract_message_content(raw: &str) -> Result<String, BatchError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| BatchError::MalformedOutput("output file is empty".to_string()))?;

    let record: Value = serde_json::from_str(line)
        .map_err(|e| BatchError::MalformedOutput(format!("invalid output record: {}", e)))?;

    if let Some(status_code) = record.pointer("/response/status_code").and_then(Value::as_u64) {
        if status_code != 200 {
            let message = record
                .pointer("/response/body/error/message")
                .and_then(Value::as_str)
                .unwrap_or("no error message");
            return Err(BatchError::MalformedOutput(format!(
                "request failed with status {}: {}",
                status_code, message
            )));
        }
    }

    record
        .pointer("/response/body/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            BatchError::MalformedOutput("no message content in output record".to_string())
        })
}
