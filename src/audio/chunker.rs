//! Frame chunker for the caption pipeline.
//!
//! Accumulates resampled samples and emits fixed-duration PCM16 frames for
//! transmission. A non-full remainder is never emitted; it is discarded on
//! reset when the session stops.

use crate::audio::frame::AudioFrame;
use crate::audio::resampler::to_pcm16;
use crate::defaults;
use std::collections::VecDeque;

/// Configuration for the frame chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Samples per emitted frame (default: 50ms worth at the target rate).
    pub frame_samples: usize,
    /// Sample rate stamped on emitted frames.
    pub sample_rate: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            frame_samples: defaults::FRAME_SAMPLES,
            sample_rate: defaults::TARGET_SAMPLE_RATE,
        }
    }
}

/// Accumulates samples and emits exact fixed-size frames.
pub struct FrameChunker {
    config: ChunkerConfig,
    /// Queued samples not yet forming a full frame.
    queue: VecDeque<f32>,
    /// Sequence for the next emitted frame.
    next_sequence: u64,
}

impl FrameChunker {
    /// Creates a new chunker with default configuration.
    pub fn new() -> Self {
        Self::with_config(ChunkerConfig::default())
    }

    /// Creates a new chunker with custom configuration.
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            next_sequence: 0,
        }
    }

    /// Number of samples currently queued below a frame boundary.
    pub fn queued_samples(&self) -> usize {
        self.queue.len()
    }

    /// Appends samples and returns every full frame now available.
    ///
    /// Emits zero or more frames per call depending on queue depth. Each
    /// frame holds exactly `frame_samples` PCM16 samples.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.queue.extend(samples.iter().copied());

        let mut frames = Vec::new();
        while self.queue.len() >= self.config.frame_samples {
            let chunk: Vec<f32> = self.queue.drain(..self.config.frame_samples).collect();
            frames.push(AudioFrame::new(
                self.next_sequence,
                self.config.sample_rate,
                to_pcm16(&chunk),
            ));
            self.next_sequence += 1;
        }
        frames
    }

    /// Discards any partial remainder and resets sequencing.
    ///
    /// Used on session stop; the remainder is never transmitted.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.next_sequence = 0;
    }
}

impl Default for FrameChunker {
    fn default() -> Self {
        Self::new()
    }
}
