//! Catch-up strategies: alternative ways of obtaining a transcript and
//! summary for recently missed live content.

use crate::defaults;
use crate::error::{Result, StreamcapError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Platforms whose stream URLs the pipeline knows how to process.
pub const SUPPORTED_PLATFORMS: &[&str] = &["twitch.tv", "youtube.com", "youtu.be", "kick.com"];

/// A request to summarize the last portion of a live stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CatchupRequest {
    pub source_url: String,
    /// How far back to look, in minutes.
    pub duration_minutes: u32,
}

impl CatchupRequest {
    pub fn new(source_url: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            source_url: source_url.into(),
            duration_minutes,
        }
    }

    /// Checks the request up front; a bad request never reaches a strategy.
    pub fn validate(&self) -> Result<()> {
        if !defaults::CATCHUP_DURATIONS_MINUTES.contains(&self.duration_minutes) {
            return Err(StreamcapError::Validation {
                message: format!(
                    "duration must be one of {:?} minutes, got {}",
                    defaults::CATCHUP_DURATIONS_MINUTES,
                    self.duration_minutes
                ),
            });
        }
        let url = self.source_url.to_ascii_lowercase();
        if !SUPPORTED_PLATFORMS.iter().any(|p| url.contains(p)) {
            return Err(StreamcapError::Validation {
                message: format!("unsupported stream platform: {}", self.source_url),
            });
        }
        Ok(())
    }
}

/// Successful catch-up output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatchupSummary {
    pub summary: String,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub processing_time_seconds: f64,
    /// Which strategy produced the result.
    #[serde(default)]
    pub method: String,
}

/// One way of obtaining a catch-up summary. Strategies run their own
/// internal retries; the orchestrator never re-enters a strategy for the
/// same task.
#[async_trait]
pub trait CatchupStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, request: &CatchupRequest) -> Result<CatchupSummary>;
}

/// One transcribed clip out of a multi-clip processing run.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptSegment {
    pub index: usize,
    pub text: String,
}

/// Joins clip transcripts into one text, ordered by clip index. Empty
/// segments are dropped rather than contributing extra whitespace.
pub fn merge_transcripts(segments: &[TranscriptSegment]) -> String {
    let mut ordered: Vec<&TranscriptSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.index);
    ordered
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lookup of previously produced transcripts, keyed by source and window.
pub trait TranscriptStore: Send + Sync {
    fn lookup(&self, request: &CatchupRequest) -> Option<CatchupSummary>;
    fn insert(&self, request: &CatchupRequest, summary: CatchupSummary);
}

/// In-memory store, suitable for one process lifetime.
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    entries: Mutex<HashMap<CatchupRequest, CatchupSummary>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptStore for InMemoryTranscriptStore {
    fn lookup(&self, request: &CatchupRequest) -> Option<CatchupSummary> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(request).cloned())
    }

    fn insert(&self, request: &CatchupRequest, summary: CatchupSummary) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(request.clone(), summary);
        }
    }
}

/// Fastest strategy: answer from previously stored transcripts, no
/// network dependency on the source.
pub struct CachedTranscriptStrategy {
    store: std::sync::Arc<dyn TranscriptStore>,
}

impl CachedTranscriptStrategy {
    pub fn new(store: std::sync::Arc<dyn TranscriptStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CatchupStrategy for CachedTranscriptStrategy {
    fn name(&self) -> &str {
        "cached-transcript"
    }

    async fn attempt(&self, request: &CatchupRequest) -> Result<CatchupSummary> {
        self.store
            .lookup(request)
            .map(|mut summary| {
                summary.method = self.name().to_string();
                summary
            })
            .ok_or_else(|| StreamcapError::NotFound {
                message: format!("no stored transcript for {}", request.source_url),
            })
    }
}

#[derive(Deserialize)]
struct CatchupAccepted {
    task_id: String,
}

#[derive(Deserialize)]
struct CatchupStatusResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Option<CatchupSummary>,
}

/// Processing path behind the documented HTTP contract. Serves as both
/// the local strategy (a co-located helper process on a loopback base
/// URL) and the remote managed one; only the base URL differs.
pub struct HttpCatchupStrategy {
    name: String,
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    poll_deadline: Duration,
}

impl HttpCatchupStrategy {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(defaults::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StreamcapError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(2),
            poll_deadline: Duration::from_secs(180),
        })
    }

    pub fn with_polling(mut self, interval: Duration, deadline: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_deadline = deadline;
        self
    }
}

#[async_trait]
impl CatchupStrategy for HttpCatchupStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, request: &CatchupRequest) -> Result<CatchupSummary> {
        let accepted: CatchupAccepted = self
            .client
            .post(format!("{}/api/catchup", self.base_url))
            .json(&serde_json::json!({
                "stream_url": request.source_url,
                "duration_minutes": request.duration_minutes,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let started = tokio::time::Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if started.elapsed() > self.poll_deadline {
                return Err(StreamcapError::Timeout {
                    message: format!("catch-up task {} did not finish in time", accepted.task_id),
                });
            }

            let status: CatchupStatusResponse = self
                .client
                .get(format!(
                    "{}/api/catchup/{}/status",
                    self.base_url, accepted.task_id
                ))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match status.status.as_str() {
                "complete" => {
                    let mut summary = status.result.ok_or_else(|| StreamcapError::Protocol {
                        message: "complete status without a result".to_string(),
                    })?;
                    summary.method = self.name.clone();
                    return Ok(summary);
                }
                "failed" => {
                    return Err(StreamcapError::Transport {
                        message: status.message,
                    });
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn summary(text: &str) -> CatchupSummary {
        CatchupSummary {
            summary: text.to_string(),
            transcript: Some("full text".to_string()),
            processing_time_seconds: 1.5,
            method: String::new(),
        }
    }

    #[test]
    fn test_validate_accepts_supported_platforms() {
        for url in [
            "https://twitch.tv/somechannel",
            "https://www.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "https://kick.com/somechannel",
        ] {
            for minutes in [30, 60] {
                assert!(CatchupRequest::new(url, minutes).validate().is_ok(), "{url}");
            }
        }
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let err = CatchupRequest::new("https://twitch.tv/x", 45)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StreamcapError::Validation { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_platform() {
        let err = CatchupRequest::new("https://example.com/stream", 30)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StreamcapError::Validation { .. }));
    }

    #[test]
    fn test_merge_orders_by_index_and_skips_empty() {
        let segments = vec![
            TranscriptSegment {
                index: 2,
                text: "third part".into(),
            },
            TranscriptSegment {
                index: 0,
                text: "first part".into(),
            },
            TranscriptSegment {
                index: 1,
                text: "   ".into(),
            },
            TranscriptSegment {
                index: 3,
                text: " last ".into(),
            },
        ];
        assert_eq!(merge_transcripts(&segments), "first part third part last");
    }

    #[test]
    fn test_merge_empty_input() {
        assert_eq!(merge_transcripts(&[]), "");
    }

    #[tokio::test]
    async fn test_cached_strategy_hit_and_miss() {
        let store = Arc::new(InMemoryTranscriptStore::new());
        let strategy = CachedTranscriptStrategy::new(store.clone());
        let request = CatchupRequest::new("https://twitch.tv/x", 30);

        let err = strategy.attempt(&request).await.unwrap_err();
        assert!(matches!(err, StreamcapError::NotFound { .. }));

        store.insert(&request, summary("recap"));
        let hit = strategy.attempt(&request).await.unwrap();
        assert_eq!(hit.summary, "recap");
        assert_eq!(hit.method, "cached-transcript");
    }

    #[tokio::test]
    async fn test_cached_strategy_keys_on_window() {
        let store = Arc::new(InMemoryTranscriptStore::new());
        let strategy = CachedTranscriptStrategy::new(store.clone());
        store.insert(&CatchupRequest::new("https://twitch.tv/x", 30), summary("a"));

        let other_window = CatchupRequest::new("https://twitch.tv/x", 60);
        assert!(strategy.attempt(&other_window).await.is_err());
    }
}
