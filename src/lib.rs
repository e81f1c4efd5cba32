//! streamcap - Live-stream caption pipeline with catch-up transcription
//!
//! Captures tab/stream audio, downsamples it to PCM16, streams it to a
//! real-time transcription service, and turns the service's turn events
//! into debounced caption updates. Large recordings upload resiliently
//! for offline transcription, and a catch-up orchestrator summarizes
//! recently missed live content through a chain of fallback strategies.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod catchup;
pub mod config;
pub mod defaults;
pub mod error;
pub mod retry;
pub mod stream;
pub mod upload;

// Core traits (source → process → sink)
pub use audio::source::{AudioCaptureSource, SampleSink};
pub use stream::session::PlaybackSink;
pub use stream::turns::{CaptionSink, CollectorSink};
pub use upload::backend::UploadBackend;

// Live transcription pipeline
pub use stream::client::{SessionState, StreamClientConfig, StreamEvent, TranscriptionStreamClient};
pub use stream::session::{SessionConfig, SessionHandle, TranscriptionSession};
pub use stream::turns::{CaptionUpdate, TurnPolicy, TurnStateMachine};

// Offline uploads
pub use upload::uploader::{ChunkConcurrency, ResilientUploader, UploadReport, UploaderConfig};

// Catch-up
pub use catchup::orchestrator::{CatchupOrchestrator, CatchupReport, ProgressUpdate};
pub use catchup::strategy::{CatchupRequest, CatchupStrategy, CatchupSummary};

// Error handling
pub use error::{Result, StreamcapError};

// Config
pub use config::Config;

// Retry utility (shared by the uploader and connection logic)
pub use retry::{RetryPolicy, retry_with_backoff};

/// Initializes stderr logging with an env-filter.
///
/// Honors `RUST_LOG`; defaults to `streamcap=info`. Intended for binaries
/// and examples embedding the pipeline; call at most once per process.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamcap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
