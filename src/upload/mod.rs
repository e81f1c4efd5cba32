//! Offline transcription uploads.
//!
//! Large recordings reach the backend three ways, in order of preference:
//! a single inline request for small payloads, a presigned direct-to-storage
//! PUT, and a chunked fallback when the presigned flow is unavailable.

pub mod backend;
pub mod task;
pub mod uploader;

pub use backend::{
    ChunkReceipt, HttpUploadBackend, PresignedTarget, UploadBackend, UploadMetadata, UploadOutcome,
};
pub use task::{ChunkState, ChunkStatus, UploadStrategy, UploadTask};
pub use uploader::{ChunkConcurrency, ResilientUploader, UploadReport, UploaderConfig};
