// src/core/service_client.rs
//! OpenAI-compatible files/batches HTTP client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::batch::BatchProvider;
use crate::core::config_manager::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{BatchObject, CreateBatchRequest, FileObject};

const FILES_ENDPOINT: &str = "/files";
const BATCHES_ENDPOINT: &str = "/batches";

pub struct OpenAiBatchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBatchClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("OPENAI_API_KEY environment variable not set")?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Provider request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(status = %status, error = %error_text, "Provider API error");
        Err(error_for_status(status, error_text))
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::Parse(format!("{}. Raw response: {}", e, text))
        })
    }
}

fn error_for_status(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit(message),
        StatusCode::BAD_REQUEST => ProviderError::BadRequest(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl BatchProvider for OpenAiBatchClient {
    async fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<FileObject, ProviderError> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/jsonl")
            .map_err(|e| ProviderError::BadRequest(format!("Failed to create multipart: {}", e)))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        info!("Uploading batch request file {}", file_name);
        let response = self
            .send(self.client.post(self.url(FILES_ENDPOINT)).multipart(form))
            .await?;
        Self::parse_json(response).await
    }

    async fn create_batch(
        &self,
        request: CreateBatchRequest,
    ) -> Result<BatchObject, ProviderError> {
        info!("Creating batch for input file {}", request.input_file_id);
        let response = self
            .send(self.client.post(self.url(BATCHES_ENDPOINT)).json(&request))
            .await?;
        Self::parse_json(response).await
    }

    async fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ProviderError> {
        debug!("Retrieving batch {}", batch_id);
        let url = self.url(&format!("{}/{}", BATCHES_ENDPOINT, batch_id));
        let response = self.send(self.client.get(url)).await?;
        Self::parse_json(response).await
    }

    async fn file_content(&self, file_id: &str) -> Result<String, ProviderError> {
        info!("Downloading file content {}", file_id);
        let url = self.url(&format!("{}/{}/content", FILES_ENDPOINT, file_id));
        let response = self.send(self.client.get(url)).await?;
        response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }
}
