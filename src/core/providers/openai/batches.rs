//! OpenAI Batch API adapter
//!
//! Upload via the Files API, then create / retrieve / cancel through the
//! Batches API. Azure OpenAI uses the same wire format with a different URL
//! layout and auth header, selected by [`ProviderAuth`].

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::config::{OpenAIBatchConfig, ProviderAuth};
use crate::core::batch::ArtifactKind;
use crate::core::providers::base_provider::{
    ArtifactStream, BatchProvider, RemoteBatch, RemoteStatus, RequestCounts, SubmitRequest,
    SubmittedBatch,
};
use crate::core::providers::unified_provider::ProviderError;

/// Slowest upload rate an input file is given time for
const MIN_UPLOAD_BYTES_PER_SEC: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateBatchRequest {
    input_file_id: String,
    endpoint: String,
    completion_window: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    error_file_id: Option<String>,
    #[serde(default)]
    request_counts: Option<RequestCounts>,
    #[serde(default)]
    errors: Option<BatchErrors>,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchErrors {
    #[serde(default)]
    data: Vec<BatchErrorData>,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchErrorData {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    line: Option<u64>,
}

impl BatchErrorData {
    fn render(&self) -> String {
        let mut rendered = String::new();
        if let Some(code) = &self.code {
            rendered.push_str(code);
            rendered.push_str(": ");
        }
        rendered.push_str(self.message.as_deref().unwrap_or("unknown error"));
        if let Some(line) = self.line {
            rendered.push_str(&format!(" (line {})", line));
        }
        rendered
    }
}

impl From<BatchObject> for RemoteBatch {
    fn from(batch: BatchObject) -> Self {
        RemoteBatch {
            status: RemoteStatus::parse(&batch.status),
            counts: batch.request_counts.unwrap_or_default(),
            output_file_id: batch.output_file_id,
            error_file_id: batch.error_file_id,
            errors: batch
                .errors
                .map(|errors| errors.data.iter().map(BatchErrorData::render).collect())
                .unwrap_or_default(),
            id: batch.id,
        }
    }
}

/// Batch adapter for OpenAI and Azure OpenAI
#[derive(Debug, Clone)]
pub struct OpenAIBatchProvider {
    client: reqwest::Client,
    config: OpenAIBatchConfig,
}

impl OpenAIBatchProvider {
    pub fn new(config: OpenAIBatchConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        // Whole-request deadlines are set per call; downloads stream for longer
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::configuration(config.provider_name(), e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAIBatchConfig {
        &self.config
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = match &self.config.auth {
            ProviderAuth::Bearer => builder.bearer_auth(&self.config.api_key),
            #[cfg(feature = "azure")]
            ProviderAuth::Azure { .. } => builder.header("api-key", &self.config.api_key),
        };
        match &self.config.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    /// Send a request, turning non-success statuses into classified errors
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let provider = self.name();
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(provider, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(
            provider,
            status.as_u16(),
            error_message(&body),
            retry_after,
        ))
    }

    async fn read_batch(&self, response: reqwest::Response) -> Result<RemoteBatch, ProviderError> {
        let batch: BatchObject = response
            .json()
            .await
            .map_err(|e| ProviderError::response_parsing(self.name(), e.to_string()))?;
        Ok(batch.into())
    }

    /// Deadline for uploading `bytes`, scaled to the file size
    fn upload_timeout(&self, bytes: usize) -> Duration {
        self.config.timeout + Duration::from_secs(bytes as u64 / MIN_UPLOAD_BYTES_PER_SEC)
    }

    async fn upload_file(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        let part = Part::bytes(request.content.to_vec())
            .file_name(request.filename.clone())
            .mime_str("application/jsonl")
            .map_err(|e| ProviderError::permanent(self.name(), e.to_string()))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self
            .send(
                self.client
                    .post(self.config.url("/files"))
                    .timeout(self.upload_timeout(request.content.len()))
                    .multipart(form),
            )
            .await?;
        let file: FileObject = response
            .json()
            .await
            .map_err(|e| ProviderError::response_parsing(self.name(), e.to_string()))?;
        debug!(file_id = %file.id, bytes = request.content.len(), "Uploaded batch input file");
        Ok(file.id)
    }
}

/// Pull the human-readable message out of an error body, or keep it verbatim
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl BatchProvider for OpenAIBatchProvider {
    fn name(&self) -> &'static str {
        self.config.provider_name()
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmittedBatch, ProviderError> {
        let input_file_id = self.upload_file(request).await?;

        let mut metadata = HashMap::new();
        metadata.insert("job_id".to_string(), request.job_id.clone());
        let body = CreateBatchRequest {
            input_file_id: input_file_id.clone(),
            endpoint: request.endpoint.clone(),
            completion_window: self.config.completion_window.clone(),
            metadata,
        };

        let response = self
            .send(
                self.client
                    .post(self.config.url("/batches"))
                    .timeout(self.config.timeout)
                    .json(&body),
            )
            .await?;
        let remote = self.read_batch(response).await?;
        info!(
            job_id = %request.job_id,
            provider_batch_id = %remote.id,
            items = request.item_count,
            "Created remote batch"
        );

        Ok(SubmittedBatch {
            provider_batch_id: remote.id.clone(),
            input_file_id: Some(input_file_id),
            remote,
        })
    }

    async fn get_status(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError> {
        let url = self.config.url(&format!("/batches/{}", provider_batch_id));
        let response = self
            .send(self.client.get(url).timeout(self.config.timeout))
            .await?;
        self.read_batch(response).await
    }

    async fn fetch_artifact(
        &self,
        provider_batch_id: &str,
        kind: ArtifactKind,
        reference: &str,
    ) -> Result<ArtifactStream, ProviderError> {
        debug!(provider_batch_id, %kind, file_id = reference, "Downloading batch artifact");
        let url = self.config.url(&format!("/files/{}/content", reference));
        let provider = self.name();
        let idle = self.config.timeout;
        let response = tokio::time::timeout(idle, self.send(self.client.get(url)))
            .await
            .map_err(|_| ProviderError::timeout(provider, format!("no response within {:?}", idle)))??;

        // Only a stalled body fails the download, however long the whole takes
        let mut body = response.bytes_stream();
        let stream = async_stream::try_stream! {
            loop {
                let next = tokio::time::timeout(idle, body.next()).await.map_err(|_| {
                    ProviderError::timeout(provider, format!("artifact stalled for {:?}", idle))
                })?;
                match next {
                    Some(chunk) => {
                        let chunk = chunk.map_err(|e| ProviderError::from_reqwest(provider, e))?;
                        yield chunk;
                    }
                    None => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn cancel(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError> {
        let url = self.config.url(&format!("/batches/{}/cancel", provider_batch_id));
        let response = self
            .send(self.client.post(url).timeout(self.config.timeout))
            .await?;
        self.read_batch(response).await
    }
}
