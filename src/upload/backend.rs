//! Backend HTTP contract for offline transcription uploads.
//!
//! The trait seam keeps the uploader testable; the reqwest implementation
//! speaks the documented wire contract. Chunk bodies travel base64-encoded;
//! the presigned flow PUTs raw bytes straight to object storage.

use crate::defaults;
use crate::error::{Result, StreamcapError};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller-supplied description of the payload.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub file_name: String,
    pub content_type: String,
}

impl Default for UploadMetadata {
    fn default() -> Self {
        Self {
            file_name: "audio.webm".to_string(),
            content_type: "audio/webm".to_string(),
        }
    }
}

/// What the backend returns once processing finishes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UploadOutcome {
    pub transcript: Option<String>,
    pub summary: Option<String>,
}

/// Short-lived direct-to-storage upload target.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PresignedTarget {
    pub upload_url: String,
    pub s3_key: String,
    pub processing_id: String,
}

/// Backend acknowledgement for one uploaded chunk.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChunkReceipt {
    pub etag: String,
}

/// Backend operations the uploader depends on.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Uploads a small payload in one request and waits for the result.
    async fn upload_inline(&self, payload: &[u8], meta: &UploadMetadata) -> Result<UploadOutcome>;

    /// Requests a presigned direct-upload target.
    async fn presigned_target(&self, file_size: usize, content_type: &str)
    -> Result<PresignedTarget>;

    /// PUTs the raw payload to the presigned target.
    async fn put_presigned(&self, target: &PresignedTarget, payload: &[u8]) -> Result<()>;

    /// Tells the backend to process an object uploaded via the presigned flow.
    async fn process_stored(&self, target: &PresignedTarget) -> Result<UploadOutcome>;

    /// Opens a chunked upload; returns the upload id.
    async fn init_chunked(&self, total_size: usize, total_chunks: usize) -> Result<String>;

    /// Uploads one chunk.
    async fn upload_chunk(&self, upload_id: &str, index: usize, data: &[u8])
    -> Result<ChunkReceipt>;

    /// Signals assembly and transcription; returns the result.
    async fn finalize_chunked(
        &self,
        upload_id: &str,
        receipts: &[ChunkReceipt],
    ) -> Result<UploadOutcome>;
}

#[derive(Serialize)]
struct InitChunkedRequest {
    total_size: usize,
    total_chunks: usize,
}

#[derive(Deserialize)]
struct InitChunkedResponse {
    upload_id: String,
}

#[derive(Serialize)]
struct UploadChunkRequest<'a> {
    upload_id: &'a str,
    chunk_index: usize,
    chunk_data: String,
    chunk_size: usize,
}

#[derive(Serialize)]
struct FinalizeRequest<'a> {
    upload_id: &'a str,
    chunk_results: Vec<&'a str>,
}

#[derive(Serialize)]
struct PresignedRequest<'a> {
    file_size: usize,
    content_type: &'a str,
}

#[derive(Serialize)]
struct ProcessStoredRequest<'a> {
    processing_id: &'a str,
    s3_key: &'a str,
}

/// reqwest implementation of the backend contract.
pub struct HttpUploadBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadBackend {
    /// Creates a backend client with the default per-request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, defaults::REQUEST_TIMEOUT)
    }

    /// Creates a backend client with a custom per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StreamcapError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Converts HTTP status classes into the crate's error taxonomy; the
    /// success body is deserialized into `T`.
    async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let response = response.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl UploadBackend for HttpUploadBackend {
    async fn upload_inline(&self, payload: &[u8], meta: &UploadMetadata) -> Result<UploadOutcome> {
        let body = serde_json::json!({
            "file_name": meta.file_name,
            "content_type": meta.content_type,
            "audio_data": BASE64.encode(payload),
        });
        let response = self
            .client
            .post(self.url("transcribe-audio"))
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn presigned_target(
        &self,
        file_size: usize,
        content_type: &str,
    ) -> Result<PresignedTarget> {
        let response = self
            .client
            .post(self.url("get-presigned-upload-url"))
            .json(&PresignedRequest {
                file_size,
                content_type,
            })
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn put_presigned(&self, target: &PresignedTarget, payload: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(&target.upload_url)
            .body(payload.to_vec())
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn process_stored(&self, target: &PresignedTarget) -> Result<UploadOutcome> {
        let response = self
            .client
            .post(self.url("process-s3-audio"))
            .json(&ProcessStoredRequest {
                processing_id: &target.processing_id,
                s3_key: &target.s3_key,
            })
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn init_chunked(&self, total_size: usize, total_chunks: usize) -> Result<String> {
        let response = self
            .client
            .post(self.url("init-chunked-upload"))
            .json(&InitChunkedRequest {
                total_size,
                total_chunks,
            })
            .send()
            .await?;
        let parsed: InitChunkedResponse = Self::read_json(response).await?;
        Ok(parsed.upload_id)
    }

    async fn upload_chunk(
        &self,
        upload_id: &str,
        index: usize,
        data: &[u8],
    ) -> Result<ChunkReceipt> {
        let response = self
            .client
            .post(self.url("upload-chunk"))
            .json(&UploadChunkRequest {
                upload_id,
                chunk_index: index,
                chunk_data: BASE64.encode(data),
                chunk_size: data.len(),
            })
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn finalize_chunked(
        &self,
        upload_id: &str,
        receipts: &[ChunkReceipt],
    ) -> Result<UploadOutcome> {
        let response = self
            .client
            .post(self.url("finalize-chunked-upload"))
            .json(&FinalizeRequest {
                upload_id,
                chunk_results: receipts.iter().map(|r| r.etag.as_str()).collect(),
            })
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpUploadBackend::new("https://api.example.com/").unwrap();
        assert_eq!(
            backend.url("upload-chunk"),
            "https://api.example.com/upload-chunk"
        );
    }

    #[test]
    fn test_chunk_request_serialization() {
        let request = UploadChunkRequest {
            upload_id: "u1",
            chunk_index: 2,
            chunk_data: BASE64.encode(b"abc"),
            chunk_size: 3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["upload_id"], "u1");
        assert_eq!(value["chunk_index"], 2);
        assert_eq!(value["chunk_data"], "YWJj");
        assert_eq!(value["chunk_size"], 3);
    }

    #[test]
    fn test_presigned_target_deserialization() {
        let target: PresignedTarget = serde_json::from_str(
            r#"{"upload_url":"https://bucket/put","s3_key":"a/b.webm","processing_id":"p9"}"#,
        )
        .unwrap();
        assert_eq!(target.s3_key, "a/b.webm");
        assert_eq!(target.processing_id, "p9");
    }

    #[test]
    fn test_outcome_fields_optional() {
        let outcome: UploadOutcome = serde_json::from_str("{}").unwrap();
        assert!(outcome.transcript.is_none());
        assert!(outcome.summary.is_none());
    }
}
