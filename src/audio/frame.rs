//! Frame types for the caption pipeline.

use crate::audio::resampler::pcm16_to_le_bytes;

/// A fixed-duration audio frame ready for transmission.
///
/// Immutable once produced; consumed exactly once by the stream client and
/// discarded after transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Sequence number for ordering frames within a session.
    pub sequence: u64,
    /// Sample rate of the contained samples.
    pub sample_rate: u32,
    /// Audio samples as signed 16-bit PCM.
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(sequence: u64, sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sequence,
            sample_rate,
            samples,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u32 * 1000) / self.sample_rate
    }

    /// Serializes the frame for the wire: little-endian PCM16, no header.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        pcm16_to_le_bytes(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(0, 16000, vec![0i16; 800]);
        assert_eq!(frame.duration_ms(), 50);
    }

    #[test]
    fn test_wire_bytes_are_twice_sample_count() {
        let frame = AudioFrame::new(3, 16000, vec![1i16; 800]);
        assert_eq!(frame.to_le_bytes().len(), 1600);
    }
}
