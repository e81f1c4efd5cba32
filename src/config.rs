use crate::defaults;
use crate::error::{Result, StreamcapError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub audio: AudioConfig,
    pub turns: TurnsConfig,
    pub upload: UploadConfig,
    pub catchup: CatchupConfig,
}

/// Streaming transcription service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub api_key: String,
    pub connect_timeout_secs: u64,
}

/// Audio pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub target_sample_rate: u32,
    pub frame_ms: u32,
}

/// Turn debounce and significance thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TurnsConfig {
    pub debounce_ms: u64,
    pub min_char_growth: usize,
    pub count_new_words: bool,
}

/// Offline upload configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub base_url: String,
    pub inline_threshold_bytes: usize,
    pub chunk_size_bytes: usize,
    pub max_retries: u32,
    pub chunk_pacing_ms: u64,
    pub max_inflight_chunks: usize,
}

/// Catch-up configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatchupConfig {
    pub local_base_url: String,
    pub remote_base_url: String,
    pub staleness_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "streaming.assemblyai.com".to_string(),
            api_key: String::new(),
            connect_timeout_secs: defaults::CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: defaults::TARGET_SAMPLE_RATE,
            frame_ms: defaults::FRAME_MS,
        }
    }
}

impl Default for TurnsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::TURN_DEBOUNCE_MS,
            min_char_growth: defaults::TURN_MIN_CHAR_GROWTH,
            count_new_words: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            inline_threshold_bytes: defaults::INLINE_UPLOAD_THRESHOLD,
            chunk_size_bytes: defaults::UPLOAD_CHUNK_SIZE,
            max_retries: defaults::MAX_RETRIES,
            chunk_pacing_ms: defaults::CHUNK_PACING.as_millis() as u64,
            max_inflight_chunks: defaults::MAX_INFLIGHT_CHUNKS,
        }
    }
}

impl Default for CatchupConfig {
    fn default() -> Self {
        Self {
            local_base_url: "http://127.0.0.1:8000".to_string(),
            remote_base_url: String::new(),
            staleness_secs: defaults::CATCHUP_STALENESS.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StreamcapError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                StreamcapError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file
    /// doesn't exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(StreamcapError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMCAP_API_KEY → stream.api_key
    /// - STREAMCAP_HOST → stream.host
    /// - STREAMCAP_UPLOAD_URL → upload.base_url
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(api_key) = std::env::var("STREAMCAP_API_KEY")
            && !api_key.is_empty()
        {
            self.stream.api_key = api_key;
        }

        if let Ok(host) = std::env::var("STREAMCAP_HOST")
            && !host.is_empty()
        {
            self.stream.host = host;
        }

        if let Ok(url) = std::env::var("STREAMCAP_UPLOAD_URL")
            && !url.is_empty()
        {
            self.upload.base_url = url;
        }

        self
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.target_sample_rate == 0 {
            return Err(StreamcapError::ConfigInvalidValue {
                key: "audio.target_sample_rate".to_string(),
                message: "must be nonzero".to_string(),
            });
        }
        if self.audio.frame_ms == 0 {
            return Err(StreamcapError::ConfigInvalidValue {
                key: "audio.frame_ms".to_string(),
                message: "must be nonzero".to_string(),
            });
        }
        if self.upload.chunk_size_bytes == 0 {
            return Err(StreamcapError::ConfigInvalidValue {
                key: "upload.chunk_size_bytes".to_string(),
                message: "must be nonzero".to_string(),
            });
        }
        if self.upload.max_inflight_chunks == 0 {
            return Err(StreamcapError::ConfigInvalidValue {
                key: "upload.max_inflight_chunks".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
