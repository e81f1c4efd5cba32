//! Streaming transcription: wire protocol, connection client, turn state
//! machine, and the per-run session that composes them.
//!
//! ```text
//! ┌─────────┐   PCM16 frames   ┌────────────────┐   turn events   ┌────────────┐
//! │ Session │─────────────────▶│ Stream client  │────────────────▶│ Turn state │──▶ captions
//! │ (audio) │                  │ (WebSocket)    │                 │ machine    │
//! └─────────┘                  └────────────────┘                 └────────────┘
//! ```

pub mod client;
pub mod protocol;
pub mod session;
pub mod turns;

pub use client::{SessionState, StreamClientConfig, StreamEvent, TranscriptionStreamClient};
pub use protocol::{InboundMessage, TurnEvent};
pub use session::{PlaybackSink, SessionConfig, SessionHandle, TranscriptionSession};
pub use turns::{
    CaptionSink, CaptionUpdate, CollectorSink, TurnAction, TurnPolicy, TurnStateMachine,
    TurnStation,
};
