//! Catch-up: summarizing the recently missed portion of a live stream.
//!
//! A request runs through an ordered chain of strategies (stored
//! transcript, local processing, remote processing) until one produces a
//! summary. The orchestrator tracks tasks and emits progress updates; it
//! renders nothing itself.

pub mod orchestrator;
pub mod strategy;

pub use orchestrator::{
    CatchupOrchestrator, CatchupReport, CatchupStatus, CatchupTask, ProgressUpdate,
};
pub use strategy::{
    CachedTranscriptStrategy, CatchupRequest, CatchupStrategy, CatchupSummary,
    HttpCatchupStrategy, InMemoryTranscriptStore, TranscriptSegment, TranscriptStore,
    merge_transcripts,
};
