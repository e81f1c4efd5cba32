//! Error types for streamcap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamcapError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transport errors: connection drops, request failures, timeouts.
    // Retryable at the connection-owner level.
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    // Protocol errors: malformed or unexpected messages. The offending
    // message is discarded; the session continues.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // Rejected credentials. Fatal to the current session, never retried.
    #[error("Authentication rejected: {message}")]
    Auth { message: String },

    // Backend endpoint missing (404). Together with Auth, this is how an
    // unsupported presigned-upload flow announces itself.
    #[error("Endpoint not found: {message}")]
    NotFound { message: String },

    // Quota or rate limit signaled by the backend. Fatal to the current
    // strategy; triggers fallback rather than retry.
    #[error("Capacity limit reached: {message}")]
    Capacity { message: String },

    // Malformed request. Fails fast, no retry, no fallback.
    #[error("Invalid request: {message}")]
    Validation { message: String },

    // Session lifecycle misuse
    #[error("Session is {state}, expected {expected}")]
    SessionState { state: String, expected: String },

    // Upload task failure after local retries are exhausted
    #[error("Upload of chunk {index} failed after {attempts} attempts: {message}")]
    ChunkExhausted {
        index: usize,
        attempts: u32,
        message: String,
    },

    // Catch-up failure after every strategy has been attempted
    #[error("All catch-up strategies failed; last attempted '{strategy}': {message}")]
    StrategiesExhausted { strategy: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl StreamcapError {
    /// Returns true if the operation may succeed on a later attempt.
    ///
    /// Transport drops and timeouts are transient; auth, capacity, and
    /// validation failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamcapError::Transport { .. } | StreamcapError::Timeout { .. }
        )
    }

    /// Returns true if the error indicates the backend does not offer the
    /// requested flow at all (missing endpoint or rejected authorization).
    ///
    /// Used to detect an unsupported presigned-upload flow and fall back to
    /// chunked upload through the backend itself.
    pub fn is_flow_unsupported(&self) -> bool {
        matches!(
            self,
            StreamcapError::Auth { .. } | StreamcapError::NotFound { .. }
        )
    }
}

impl From<reqwest::Error> for StreamcapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return StreamcapError::Timeout {
                message: err.to_string(),
            };
        }
        match err.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => StreamcapError::Auth {
                message: err.to_string(),
            },
            Some(404) => StreamcapError::NotFound {
                message: err.to_string(),
            },
            Some(429) => StreamcapError::Capacity {
                message: err.to_string(),
            },
            _ => StreamcapError::Transport {
                message: err.to_string(),
            },
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamcapError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match &err {
            WsError::Http(response) => {
                let code = response.status().as_u16();
                if code == 401 || code == 403 {
                    StreamcapError::Auth {
                        message: format!("websocket handshake rejected with {code}"),
                    }
                } else {
                    StreamcapError::Transport {
                        message: err.to_string(),
                    }
                }
            }
            _ => StreamcapError::Transport {
                message: err.to_string(),
            },
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, StreamcapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transport_display() {
        let error = StreamcapError::Transport {
            message: "connection reset".to_string(),
        };
        assert_eq!(error.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = StreamcapError::ConfigInvalidValue {
            key: "frame_ms".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for frame_ms: must be positive"
        );
    }

    #[test]
    fn test_chunk_exhausted_display() {
        let error = StreamcapError::ChunkExhausted {
            index: 4,
            attempts: 3,
            message: "503 from backend".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Upload of chunk 4 failed after 3 attempts: 503 from backend"
        );
    }

    #[test]
    fn test_strategies_exhausted_display() {
        let error = StreamcapError::StrategiesExhausted {
            strategy: "remote-processor".to_string(),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "All catch-up strategies failed; last attempted 'remote-processor': quota exceeded"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            StreamcapError::Transport {
                message: "reset".into()
            }
            .is_retryable()
        );
        assert!(
            StreamcapError::Timeout {
                message: "30s".into()
            }
            .is_retryable()
        );
        assert!(
            !StreamcapError::Auth {
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(
            !StreamcapError::Capacity {
                message: "quota".into()
            }
            .is_retryable()
        );
        assert!(
            !StreamcapError::Validation {
                message: "bad url".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_flow_unsupported_classification() {
        assert!(
            StreamcapError::Auth {
                message: "403".into()
            }
            .is_flow_unsupported()
        );
        assert!(
            StreamcapError::NotFound {
                message: "404".into()
            }
            .is_flow_unsupported()
        );
        assert!(
            !StreamcapError::Transport {
                message: "reset".into()
            }
            .is_flow_unsupported()
        );
        assert!(
            !StreamcapError::Timeout {
                message: "30s".into()
            }
            .is_flow_unsupported()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: StreamcapError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: StreamcapError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<StreamcapError>();
        assert_sync::<StreamcapError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
