//! Request Codec
//!
//! Encodes work items into the OpenAI batch JSONL request format and decodes
//! result lines back into per-item outcomes. Decoding is per line: one bad
//! line never aborts the rest of an artifact.

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use super::custom_id;
use super::types::{
    ArtifactKind, DecodeFailure, DecodeFailureKey, ItemError, ItemRef, ModelConfig, WorkItem,
};
use crate::core::providers::{ArtifactStream, ProviderError};
use crate::utils::error::{BatchError, Result};

/// Maximum requests per batch accepted by the OpenAI Batch API
pub const DEFAULT_MAX_ITEMS: usize = 50_000;
/// Per-line ceiling
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;
/// Input file ceiling accepted by the Files API for batches
pub const DEFAULT_MAX_FILE_BYTES: usize = 200 * 1024 * 1024;

/// Remote service limits checked before anything is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    pub max_items: usize,
    pub max_line_bytes: usize,
    pub max_file_bytes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// One request line of the batch input file
#[derive(Debug, Serialize)]
struct RequestLine<'a> {
    custom_id: &'a str,
    method: &'static str,
    url: &'a str,
    body: Value,
}

/// Encoded request file ready for submission
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub content: Bytes,
    pub item_count: u64,
    /// `custom_id` of every line, in file order
    pub custom_ids: Vec<String>,
    /// Hex SHA-256 of `content`
    pub checksum: String,
}

#[derive(Debug, Deserialize)]
struct ResponseLine {
    #[serde(default)]
    response: Option<ResponseBody>,
    #[serde(default)]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    status_code: u16,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of one well-formed result line
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLine {
    /// 2xx response; `body` goes to the result store
    Success { item: ItemRef, body: Value },
    /// The remote service reported a failure for this item
    Failure(ItemError),
}

impl DecodedLine {
    pub fn item(&self) -> &ItemRef {
        match self {
            DecodedLine::Success { item, .. } => item,
            DecodedLine::Failure(error) => &error.item,
        }
    }
}

/// Converts between work items and JSONL lines
#[derive(Debug, Clone, Default)]
pub struct RequestCodec {
    limits: CodecLimits,
}

impl RequestCodec {
    pub fn new(limits: CodecLimits) -> Self {
        Self { limits }
    }

    /// Encode items into a request file, enforcing every limit up front
    pub fn encode(&self, items: &[WorkItem], model: &ModelConfig) -> Result<EncodedBatch> {
        if items.len() > self.limits.max_items {
            return Err(BatchError::PayloadTooLarge(format!(
                "{} items exceeds the limit of {} per batch",
                items.len(),
                self.limits.max_items
            )));
        }

        let mut content = Vec::new();
        let mut custom_ids = Vec::with_capacity(items.len());
        let mut seen = HashSet::with_capacity(items.len());

        for work in items {
            let id = custom_id::encode(&work.item).map_err(|e| {
                BatchError::Validation(format!("item {}: invalid custom_id: {}", work.item, e))
            })?;
            if !seen.insert(id.clone()) {
                return Err(BatchError::Validation(format!(
                    "duplicate custom_id {} for item {}",
                    id, work.item
                )));
            }

            let line = RequestLine {
                custom_id: &id,
                method: "POST",
                url: &model.endpoint,
                body: request_body(work, model)?,
            };
            let mut encoded = serde_json::to_vec(&line)?;
            if encoded.len() > self.limits.max_line_bytes {
                return Err(BatchError::PayloadTooLarge(format!(
                    "item {} encodes to {} bytes, over the {} byte line limit",
                    work.item,
                    encoded.len(),
                    self.limits.max_line_bytes
                )));
            }
            encoded.push(b'\n');
            if content.len() + encoded.len() > self.limits.max_file_bytes {
                return Err(BatchError::PayloadTooLarge(format!(
                    "request file exceeds {} bytes at item {}",
                    self.limits.max_file_bytes, work.item
                )));
            }
            content.extend_from_slice(&encoded);
            custom_ids.push(id);
        }

        let checksum = hex::encode(Sha256::digest(&content));
        Ok(EncodedBatch {
            content: Bytes::from(content),
            item_count: items.len() as u64,
            custom_ids,
            checksum,
        })
    }

    /// Decode one result line
    ///
    /// Failures are keyed by `custom_id` when it was readable, otherwise by
    /// the zero-based line index.
    pub fn decode_line(
        &self,
        index: usize,
        line: &[u8],
        artifact: ArtifactKind,
    ) -> std::result::Result<DecodedLine, DecodeFailure> {
        let by_index = |reason: String| DecodeFailure {
            key: DecodeFailureKey::LineIndex(index),
            artifact,
            reason,
        };

        let value: Value = serde_json::from_slice(line)
            .map_err(|e| by_index(format!("invalid JSON: {}", e)))?;
        let id = value
            .get("custom_id")
            .and_then(Value::as_str)
            .ok_or_else(|| by_index("missing custom_id".to_string()))?
            .to_string();
        let item = custom_id::decode(&id)
            .map_err(|e| by_index(format!("unparseable custom_id {:?}: {}", id, e)))?;

        let by_id = |reason: String| DecodeFailure {
            key: DecodeFailureKey::CustomId(id.clone()),
            artifact,
            reason,
        };
        let parsed: ResponseLine =
            serde_json::from_value(value).map_err(|e| by_id(format!("unexpected shape: {}", e)))?;

        if let Some(error) = parsed.error {
            return Ok(DecodedLine::Failure(ItemError {
                item,
                status_code: parsed.response.as_ref().map(|r| r.status_code),
                code: error.code.unwrap_or_else(|| "unknown".to_string()),
                message: error.message.unwrap_or_default(),
            }));
        }

        match parsed.response {
            Some(response) if (200..300).contains(&response.status_code) => {
                Ok(DecodedLine::Success {
                    item,
                    body: response.body,
                })
            }
            Some(response) => {
                let code = response
                    .body
                    .pointer("/error/code")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("http_{}", response.status_code));
                let message = response
                    .body
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| response.body.to_string());
                Ok(DecodedLine::Failure(ItemError {
                    item,
                    status_code: Some(response.status_code),
                    code,
                    message,
                }))
            }
            None => Err(by_id("line has neither response nor error".to_string())),
        }
    }
}

fn request_body(work: &WorkItem, model: &ModelConfig) -> Result<Value> {
    let Value::Object(payload) = &work.payload else {
        return Err(BatchError::Validation(format!(
            "item {}: payload must be a JSON object",
            work.item
        )));
    };
    let mut body: Map<String, Value> = payload.clone();
    body.insert("model".to_string(), Value::String(model.model.clone()));
    if let Some(max_tokens) = model.max_tokens {
        body.insert("max_tokens".to_string(), Value::from(max_tokens));
    }
    if let Some(temperature) = model.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    Ok(Value::Object(body))
}

/// Split a streamed artifact into `(line_index, line)` pairs
///
/// Only the current partial line is buffered. Trailing `\r` is stripped and
/// the final line need not end in `\n`.
pub fn artifact_lines(
    mut stream: ArtifactStream,
) -> impl Stream<Item = std::result::Result<(usize, Vec<u8>), ProviderError>> + Send {
    try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut index = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let mut scanned = buffer.len();
            buffer.extend_from_slice(&chunk);
            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let end = scanned + offset;
                let mut line: Vec<u8> = buffer.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                yield (index, line);
                index += 1;
                scanned = 0;
            }
        }
        if !buffer.is_empty() {
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
            yield (index, buffer);
        }
    }
}
