//! Audio capture source abstraction.
//!
//! The concrete capture mechanism (browser tab audio, virtual device, file)
//! is an external collaborator supplied at construction time; the pipeline
//! only sees raw sample buffers at the source's native rate.

use crate::error::Result;

/// Receives raw sample buffers from a capture source.
///
/// Invoked from the source's own capture thread at a cadence set by the
/// device buffer size. Implementations must not block: resampling and
/// chunking are bounded synchronous work, and frames leave through a
/// non-blocking channel send.
pub type SampleSink = Box<dyn FnMut(&[f32]) + Send>;

/// Trait for audio capture sources.
///
/// Allows swapping implementations (real capture backend vs mock).
pub trait AudioCaptureSource: Send {
    /// Starts capture, delivering sample buffers to `sink` until stopped.
    fn start(&mut self, sink: SampleSink) -> Result<()>;

    /// Stops capture and releases the sink. Must be idempotent.
    fn stop(&mut self) -> Result<()>;

    /// Native sample rate of the buffers this source delivers.
    fn native_rate(&self) -> u32;
}

/// Mock capture source for testing.
///
/// Delivers pre-programmed buffers synchronously on `start`, then keeps the
/// sink for manual delivery via [`MockCaptureSource::emit`].
pub struct MockCaptureSource {
    native_rate: u32,
    buffers: Vec<Vec<f32>>,
    sink: Option<SampleSink>,
    started: bool,
    stopped: bool,
    fail_start: bool,
    fail_stop: bool,
}

impl MockCaptureSource {
    /// Creates a mock source with a 48kHz native rate and no buffers.
    pub fn new() -> Self {
        Self {
            native_rate: 48000,
            buffers: Vec::new(),
            sink: None,
            started: false,
            stopped: false,
            fail_start: false,
            fail_stop: false,
        }
    }

    /// Sets the native sample rate reported by the source.
    pub fn with_native_rate(mut self, rate: u32) -> Self {
        self.native_rate = rate;
        self
    }

    /// Buffers delivered to the sink immediately on start.
    pub fn with_buffers(mut self, buffers: Vec<Vec<f32>>) -> Self {
        self.buffers = buffers;
        self
    }

    /// Configures the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Configures the mock to fail on stop.
    pub fn with_stop_failure(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Delivers one buffer through the held sink, if capture is active.
    pub fn emit(&mut self, samples: &[f32]) {
        if let Some(sink) = self.sink.as_mut() {
            sink(samples);
        }
    }

    /// Returns true if start was called.
    pub fn was_started(&self) -> bool {
        self.started
    }

    /// Returns true if stop was called.
    pub fn was_stopped(&self) -> bool {
        self.stopped
    }
}

impl Default for MockCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCaptureSource for MockCaptureSource {
    fn start(&mut self, mut sink: SampleSink) -> Result<()> {
        if self.fail_start {
            return Err(crate::error::StreamcapError::AudioCapture {
                message: "mock start failure".to_string(),
            });
        }
        self.started = true;
        for buffer in std::mem::take(&mut self.buffers) {
            sink(&buffer);
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        self.sink = None;
        if self.fail_stop {
            return Err(crate::error::StreamcapError::AudioCapture {
                message: "mock stop failure".to_string(),
            });
        }
        Ok(())
    }

    fn native_rate(&self) -> u32 {
        self.native_rate
    }
}
