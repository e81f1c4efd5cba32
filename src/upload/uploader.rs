//! Resilient large-payload uploader.
//!
//! Picks an upload strategy by payload size, falls back from the presigned
//! flow to chunked upload when the backend does not offer it, and retries
//! each network operation with exponential backoff. A task either completes
//! fully or fails terminally; no partial results are assembled.

use crate::defaults;
use crate::error::{Result, StreamcapError};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::upload::backend::{ChunkReceipt, UploadBackend, UploadMetadata, UploadOutcome};
use crate::upload::task::{ChunkStatus, UploadStrategy, UploadTask};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// How chunks within one task are scheduled.
///
/// Sequential respects session-oriented backend state; bounded concurrency
/// suits a stateless-per-chunk backend. The two modes are mutually
/// exclusive per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkConcurrency {
    Sequential,
    Bounded(usize),
}

/// Uploader tuning knobs.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Payloads below this go up in one inline request.
    pub inline_threshold: usize,
    /// Chunk size for the multi-chunk fallback.
    pub chunk_size: usize,
    /// Retry/backoff policy applied to each network operation.
    pub retry: RetryPolicy,
    /// Pause between sequential chunk uploads.
    pub chunk_pacing: Duration,
    pub concurrency: ChunkConcurrency,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            inline_threshold: defaults::INLINE_UPLOAD_THRESHOLD,
            chunk_size: defaults::UPLOAD_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            chunk_pacing: defaults::CHUNK_PACING,
            concurrency: ChunkConcurrency::Sequential,
        }
    }
}

/// Result of a finished upload: the final task bookkeeping plus whatever
/// the backend produced.
#[derive(Debug)]
pub struct UploadReport {
    pub task: UploadTask,
    pub outcome: UploadOutcome,
}

/// Uploads large audio payloads for offline transcription.
pub struct ResilientUploader {
    backend: Arc<dyn UploadBackend>,
    config: UploaderConfig,
}

impl ResilientUploader {
    /// Creates an uploader with default configuration.
    pub fn new(backend: Arc<dyn UploadBackend>) -> Self {
        Self::with_config(backend, UploaderConfig::default())
    }

    /// Creates an uploader with custom configuration.
    pub fn with_config(backend: Arc<dyn UploadBackend>, config: UploaderConfig) -> Self {
        Self { backend, config }
    }

    /// Uploads a payload, choosing the strategy by size.
    ///
    /// Returns a single terminal error per task; retry counts stay
    /// internal.
    pub async fn upload(&self, payload: &[u8], meta: &UploadMetadata) -> Result<UploadReport> {
        if payload.is_empty() {
            return Err(StreamcapError::Validation {
                message: "empty payload".to_string(),
            });
        }

        if payload.len() < self.config.inline_threshold {
            return self.inline_flow(payload, meta).await;
        }

        match self.presigned_flow(payload, meta).await {
            Ok(report) => Ok(report),
            Err(err) if err.is_flow_unsupported() => {
                info!(%err, "presigned flow unavailable, falling back to chunked upload");
                self.chunked_flow(payload).await
            }
            Err(err) => Err(err),
        }
    }

    async fn inline_flow(&self, payload: &[u8], meta: &UploadMetadata) -> Result<UploadReport> {
        let outcome = retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            let payload = payload.to_vec();
            let meta = meta.clone();
            async move { backend.upload_inline(&payload, &meta).await }
        })
        .await?;

        let mut task = UploadTask::new(
            new_task_id(),
            payload.len(),
            payload.len(),
            UploadStrategy::Single,
        );
        mark_all_done(&mut task);
        Ok(UploadReport { task, outcome })
    }

    async fn presigned_flow(&self, payload: &[u8], meta: &UploadMetadata) -> Result<UploadReport> {
        let size = payload.len();
        let content_type = meta.content_type.clone();
        let target = retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            let content_type = content_type.clone();
            async move { backend.presigned_target(size, &content_type).await }
        })
        .await?;

        retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            let target = target.clone();
            let payload = payload.to_vec();
            async move { backend.put_presigned(&target, &payload).await }
        })
        .await?;

        let outcome = retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            let target = target.clone();
            async move { backend.process_stored(&target).await }
        })
        .await?;

        let mut task = UploadTask::new(new_task_id(), size, size, UploadStrategy::Presigned);
        mark_all_done(&mut task);
        Ok(UploadReport { task, outcome })
    }

    async fn chunked_flow(&self, payload: &[u8]) -> Result<UploadReport> {
        let mut task = UploadTask::new(
            new_task_id(),
            payload.len(),
            self.config.chunk_size,
            UploadStrategy::MultiChunk,
        );
        let total_chunks = task.chunks.len();
        let total_size = payload.len();

        let upload_id = retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            async move { backend.init_chunked(total_size, total_chunks).await }
        })
        .await?;

        match self.config.concurrency {
            ChunkConcurrency::Sequential => {
                self.upload_chunks_sequential(payload, &upload_id, &mut task)
                    .await?
            }
            ChunkConcurrency::Bounded(limit) => {
                self.upload_chunks_bounded(payload, &upload_id, &mut task, limit)
                    .await?
            }
        }

        let receipts: Vec<ChunkReceipt> = task
            .chunks
            .iter()
            .filter_map(|c| c.etag.clone())
            .map(|etag| ChunkReceipt { etag })
            .collect();

        let outcome = retry_with_backoff(&self.config.retry, StreamcapError::is_retryable, |_| {
            let backend = self.backend.clone();
            let upload_id = upload_id.clone();
            let receipts = receipts.clone();
            async move { backend.finalize_chunked(&upload_id, &receipts).await }
        })
        .await?;

        Ok(UploadReport { task, outcome })
    }

    async fn upload_chunks_sequential(
        &self,
        payload: &[u8],
        upload_id: &str,
        task: &mut UploadTask,
    ) -> Result<()> {
        let last_index = task.chunks.len().saturating_sub(1);
        for chunk in task.chunks.iter_mut() {
            chunk.status = ChunkStatus::InFlight;
            let data = &payload[chunk.offset..chunk.offset + chunk.len];
            let attempts = AtomicU32::new(0);
            let index = chunk.index;
            let result = retry_with_backoff(
                &self.config.retry,
                StreamcapError::is_retryable,
                |attempt| {
                    attempts.store(attempt, Ordering::SeqCst);
                    let backend = self.backend.clone();
                    let upload_id = upload_id.to_string();
                    let data = data.to_vec();
                    async move { backend.upload_chunk(&upload_id, index, &data).await }
                },
            )
            .await;

            chunk.attempts = attempts.load(Ordering::SeqCst);
            match result {
                Ok(receipt) => {
                    chunk.status = ChunkStatus::Done;
                    chunk.etag = Some(receipt.etag);
                }
                Err(err) => {
                    chunk.status = ChunkStatus::Failed;
                    warn!(index, attempts = chunk.attempts, %err, "chunk upload exhausted");
                    return Err(StreamcapError::ChunkExhausted {
                        index,
                        attempts: chunk.attempts,
                        message: err.to_string(),
                    });
                }
            }

            if chunk.index < last_index {
                tokio::time::sleep(self.config.chunk_pacing).await;
            }
        }
        Ok(())
    }

    async fn upload_chunks_bounded(
        &self,
        payload: &[u8],
        upload_id: &str,
        task: &mut UploadTask,
        limit: usize,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        let mut join_set: JoinSet<(usize, u32, Result<ChunkReceipt>)> = JoinSet::new();

        for chunk in &mut task.chunks {
            chunk.status = ChunkStatus::InFlight;
            let semaphore = semaphore.clone();
            let backend = self.backend.clone();
            let retry = self.config.retry;
            let upload_id = upload_id.to_string();
            let data = payload[chunk.offset..chunk.offset + chunk.len].to_vec();
            let index = chunk.index;
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let attempts = AtomicU32::new(0);
                let result =
                    retry_with_backoff(&retry, StreamcapError::is_retryable, |attempt| {
                        attempts.store(attempt, Ordering::SeqCst);
                        let backend = backend.clone();
                        let upload_id = upload_id.clone();
                        let data = data.clone();
                        async move { backend.upload_chunk(&upload_id, index, &data).await }
                    })
                    .await;
                (index, attempts.load(Ordering::SeqCst), result)
            });
        }

        let mut failure: Option<StreamcapError> = None;
        while let Some(joined) = join_set.join_next().await {
            let (index, attempts, result) = joined
                .map_err(|e| StreamcapError::Other(format!("chunk task panicked: {e}")))?;
            let chunk = &mut task.chunks[index];
            chunk.attempts = attempts;
            match result {
                Ok(receipt) => {
                    chunk.status = ChunkStatus::Done;
                    chunk.etag = Some(receipt.etag);
                }
                Err(err) => {
                    chunk.status = ChunkStatus::Failed;
                    warn!(index, attempts, %err, "chunk upload exhausted");
                    if failure.is_none() {
                        failure = Some(StreamcapError::ChunkExhausted {
                            index,
                            attempts,
                            message: err.to_string(),
                        });
                        join_set.abort_all();
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn mark_all_done(task: &mut UploadTask) {
    for chunk in &mut task.chunks {
        chunk.attempts = chunk.attempts.max(1);
        chunk.status = ChunkStatus::Done;
    }
}

fn new_task_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("upload-{nanos:x}")
}
