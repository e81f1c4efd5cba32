//! Audio front-end: capture abstraction, resampling, and frame chunking.
//!
//! ```text
//! ┌──────────────┐    ┌───────────┐    ┌──────────────┐
//! │ Capture      │───▶│ Resampler │───▶│ FrameChunker │───▶ stream client
//! │ (native rate)│    │ (16 kHz)  │    │ (50ms PCM16) │
//! └──────────────┘    └───────────┘    └──────────────┘
//!        │
//!        └── native-rate passthrough ──▶ playback sink
//! ```

pub mod chunker;
pub mod frame;
pub mod resampler;
pub mod source;

pub use chunker::{ChunkerConfig, FrameChunker};
pub use frame::AudioFrame;
pub use resampler::{pcm16_to_le_bytes, resample, resample_into, to_pcm16};
pub use source::{AudioCaptureSource, MockCaptureSource, SampleSink};
