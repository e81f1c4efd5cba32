//! Per-run transcription session.
//!
//! Composition root wiring one capture source through the resampler and
//! chunker into the stream client, and the service's turn events through
//! the turn state machine into a caption sink. One session per active
//! capture; multiple concurrent sessions are independent instances.

use crate::audio::chunker::{ChunkerConfig, FrameChunker};
use crate::audio::frame::AudioFrame;
use crate::audio::resampler::resample_into;
use crate::audio::source::AudioCaptureSource;
use crate::defaults;
use crate::error::{Result, StreamcapError};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::stream::client::{StreamClientConfig, StreamEvent, TranscriptionStreamClient};
use crate::stream::turns::{CaptionSink, TurnPolicy, TurnStateMachine, TurnStation};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives native-rate samples untouched, for quality-preserving playback.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, samples: &[f32], sample_rate: u32);
}

/// Configuration for a transcription session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Streaming service connection settings.
    pub stream: StreamClientConfig,
    /// Rate the transcription path downsamples to.
    pub target_rate: u32,
    /// Duration of one transmitted frame in milliseconds.
    pub frame_ms: u32,
    /// Turn debounce/significance policy.
    pub policy: TurnPolicy,
    /// Backoff applied when establishing the connection.
    pub connect_retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream: StreamClientConfig::default(),
            target_rate: defaults::TARGET_SAMPLE_RATE,
            frame_ms: defaults::FRAME_MS,
            policy: TurnPolicy::default(),
            connect_retry: RetryPolicy::default(),
        }
    }
}

/// A live transcription session.
pub struct TranscriptionSession;

impl TranscriptionSession {
    /// Starts a session: connects to the service, starts capture, and wires
    /// the pipeline. Returns a handle used to stop it.
    ///
    /// Capture-callback work (passthrough, resample, chunk, enqueue) is
    /// bounded and synchronous; frames leave through an unbounded channel
    /// whose send never blocks the callback.
    pub async fn start(
        config: SessionConfig,
        mut capture: Box<dyn AudioCaptureSource>,
        captions: Arc<dyn CaptionSink>,
        playback: Option<Arc<dyn PlaybackSink>>,
    ) -> Result<SessionHandle> {
        let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();
        // A failed client is never restarted: each attempt gets a fresh one.
        let mut client = retry_with_backoff(
            &config.connect_retry,
            StreamcapError::is_retryable,
            |_| {
                let stream_config = config.stream.clone();
                let events = stream_tx.clone();
                async move {
                    let mut client = TranscriptionStreamClient::new(stream_config);
                    client.start(events).await?;
                    Ok(client)
                }
            },
        )
        .await?;

        let error_slot: Arc<Mutex<Option<StreamcapError>>> = Arc::new(Mutex::new(None));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Turn events → state machine → captions
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::with_policy(config.policy.clone()));
        let turns = tokio::spawn(station.run(turn_rx, captions));

        // Service events → turn channel, transport errors → error slot
        let forward_error = error_slot.clone();
        let mut forward_shutdown = shutdown_rx.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = forward_shutdown.changed() => return,
                    maybe_event = stream_rx.recv() => {
                        match maybe_event {
                            None | Some(StreamEvent::Terminated) => return,
                            Some(StreamEvent::Begin { .. }) => {}
                            Some(StreamEvent::Turn(turn)) => {
                                if turn_tx.send(turn).is_err() {
                                    return;
                                }
                            }
                            Some(StreamEvent::TransportError { message }) => {
                                set_error(
                                    &forward_error,
                                    StreamcapError::Transport { message },
                                );
                                return;
                            }
                        }
                    }
                }
            }
        });

        // Capture callback: passthrough + resample + chunk, never blocking
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<AudioFrame>();
        let stopping = Arc::new(AtomicBool::new(false));
        let native_rate = capture.native_rate();
        let target_rate = config.target_rate;
        let mut chunker = FrameChunker::with_config(ChunkerConfig {
            frame_samples: (target_rate as usize * config.frame_ms as usize) / 1000,
            sample_rate: target_rate,
        });
        let callback_stopping = stopping.clone();
        let mut scratch: Vec<f32> = Vec::new();
        let start_result = capture.start(Box::new(move |samples| {
            if callback_stopping.load(Ordering::Relaxed) {
                return;
            }
            if let Some(playback) = &playback {
                playback.play(samples, native_rate);
            }
            scratch.clear();
            resample_into(samples, native_rate, target_rate, &mut scratch);
            for frame in chunker.push(&scratch) {
                if frame_tx.send(frame).is_err() {
                    return;
                }
            }
        }));
        if let Err(err) = start_result {
            let _ = client.stop().await;
            return Err(err);
        }

        // Sender: drains frames as fast as the transport accepts them
        let sender_error = error_slot.clone();
        let mut sender_shutdown = shutdown_rx;
        let sender = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sender_shutdown.changed() => break,
                    maybe_frame = frame_rx.recv() => {
                        let Some(frame) = maybe_frame else { break };
                        if let Err(err) = client.send_frame(&frame).await {
                            // Surfaced, not fatal: the caller decides whether
                            // to stop or start a fresh session.
                            warn!(%err, "frame transmission failed");
                            set_error(&sender_error, err);
                        }
                    }
                }
            }
            if let Err(err) = client.stop().await {
                debug!(%err, "stream close reported an error");
            }
        });

        Ok(SessionHandle {
            capture: Some(capture),
            shutdown: shutdown_tx,
            stopping,
            tasks: vec![sender, forwarder, turns],
            error_slot,
        })
    }
}

fn set_error(slot: &Arc<Mutex<Option<StreamcapError>>>, err: StreamcapError) {
    if let Ok(mut guard) = slot.lock()
        && guard.is_none()
    {
        *guard = Some(err);
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    capture: Option<Box<dyn AudioCaptureSource>>,
    shutdown: watch::Sender<bool>,
    stopping: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    error_slot: Arc<Mutex<Option<StreamcapError>>>,
}

impl SessionHandle {
    /// Returns true until `stop` runs.
    pub fn is_running(&self) -> bool {
        !self.stopping.load(Ordering::Relaxed)
    }

    /// Takes the first error surfaced by the pipeline, if any.
    pub fn take_error(&self) -> Option<StreamcapError> {
        self.error_slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Stops the session: halts audio intake, cancels any pending caption
    /// debounce without emitting, closes the connection with a normal
    /// closure, and releases buffers.
    ///
    /// Idempotent, and completes even if the capture or network close
    /// fails — those failures are logged, not returned.
    pub async fn stop(&mut self) -> Result<()> {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mut capture) = self.capture.take()
            && let Err(err) = capture.stop()
        {
            warn!(%err, "capture stop failed");
        }

        let _ = self.shutdown.send(true);

        for task in self.tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("session task did not finish before deadline");
            }
        }
        Ok(())
    }
}
