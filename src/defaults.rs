//! Default configuration constants for streamcap.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

use std::time::Duration;

/// Sample rate expected by the streaming speech service, in Hz.
///
/// 16kHz is the standard for speech recognition; capture sources running at
/// higher native rates are downsampled to this before transmission.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Duration of one transmitted audio frame in milliseconds.
///
/// 50ms at 16kHz is 800 samples (1600 bytes of PCM16), small enough for
/// low caption latency and large enough to keep message overhead down.
pub const FRAME_MS: u32 = 50;

/// Samples per transmitted frame at the target rate.
pub const FRAME_SAMPLES: usize = (TARGET_SAMPLE_RATE as usize * FRAME_MS as usize) / 1000;

/// Debounce window for partial turn updates in milliseconds.
///
/// Rapid successive partials within this window are coalesced into one
/// caption emission. Final turns bypass the window entirely.
pub const TURN_DEBOUNCE_MS: u64 = 50;

/// Minimum character growth for a partial turn update to be significant.
///
/// Partials that grow the text by fewer characters (and add no new word)
/// are discarded to suppress caption flicker.
pub const TURN_MIN_CHAR_GROWTH: usize = 2;

/// Payload size below which a single inline upload request is used.
///
/// 6 MiB stays under typical application-server body limits; anything
/// larger goes through the presigned or chunked flows.
pub const INLINE_UPLOAD_THRESHOLD: usize = 6 * 1024 * 1024;

/// Chunk size for the multi-chunk upload fallback.
///
/// 4 MiB keeps each base64-encoded request body comfortably below backend
/// limits while bounding the number of round trips.
pub const UPLOAD_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Pause between sequential chunk uploads.
///
/// A stateful backend session assembles chunks in order; pacing avoids
/// overwhelming it.
pub const CHUNK_PACING: Duration = Duration::from_millis(200);

/// Maximum retries per network operation (attempts = retries + 1).
pub const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff between retries.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound on a single backoff delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Maximum simultaneous in-flight chunks when the backend is
/// stateless-per-chunk and bounded concurrency is enabled.
pub const MAX_INFLIGHT_CHUNKS: usize = 3;

/// Timeout for establishing the streaming connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for an individual backend HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Age after which a catch-up task is removed from tracking regardless of
/// state.
pub const CATCHUP_STALENESS: Duration = Duration::from_secs(600);

/// Catch-up windows the backend accepts, in minutes.
pub const CATCHUP_DURATIONS_MINUTES: &[u32] = &[30, 60];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_samples_matches_rate_and_duration() {
        // 50ms at 16kHz = 800 samples
        assert_eq!(FRAME_SAMPLES, 800);
    }

    #[test]
    fn inline_threshold_below_chunked_territory() {
        assert!(INLINE_UPLOAD_THRESHOLD > UPLOAD_CHUNK_SIZE);
    }
}
