//! Wire types for the streaming speech service.
//!
//! Outbound messages are raw binary PCM16-LE frames; inbound messages are
//! JSON objects tagged by `type`. Malformed inbound messages are protocol
//! errors: logged and discarded, the session continues.

use crate::error::{Result, StreamcapError};
use serde::Deserialize;

/// One refinement of a conversational turn.
///
/// The service re-sends the full current text for a turn as it refines it;
/// `turn_order` is non-decreasing within a session and `end_of_turn` marks
/// the terminal update for that turn.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TurnEvent {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub end_of_turn: bool,
    pub turn_order: u64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub end_of_turn_confidence: f64,
    #[serde(default)]
    pub turn_is_formatted: bool,
}

/// Inbound messages from the speech service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Session established.
    Begin {
        #[serde(default)]
        id: Option<String>,
    },
    /// A turn update.
    Turn(TurnEvent),
    /// Graceful end of session.
    Termination {
        #[serde(default)]
        audio_duration_seconds: Option<f64>,
    },
}

/// Parses one inbound text message.
pub fn parse_inbound(text: &str) -> Result<InboundMessage> {
    serde_json::from_str(text).map_err(|e| StreamcapError::Protocol {
        message: format!("unparseable service message: {e}"),
    })
}

/// The polite shutdown message sent before closing the connection.
pub fn terminate_message() -> String {
    r#"{"type":"Terminate"}"#.to_string()
}

/// Builds the streaming endpoint URL.
///
/// `host` is the bare service host (e.g. `streaming.example.com`).
pub fn stream_url(host: &str, sample_rate: u32, token: &str) -> String {
    stream_url_with_scheme("wss", host, sample_rate, token)
}

/// URL builder with an explicit scheme, for plaintext local testing.
pub fn stream_url_with_scheme(scheme: &str, host: &str, sample_rate: u32, token: &str) -> String {
    format!("{scheme}://{host}/v3/ws?sample_rate={sample_rate}&format_turns=true&token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_begin() {
        let msg = parse_inbound(r#"{"type":"Begin","id":"sess-1"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Begin {
                id: Some("sess-1".to_string())
            }
        );
    }

    #[test]
    fn test_parse_turn() {
        let msg = parse_inbound(
            r#"{"type":"Turn","transcript":"hello there","end_of_turn":true,"turn_order":3,"end_of_turn_confidence":0.91}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::Turn(turn) => {
                assert_eq!(turn.transcript, "hello there");
                assert!(turn.end_of_turn);
                assert_eq!(turn.turn_order, 3);
                assert!((turn.end_of_turn_confidence - 0.91).abs() < 1e-9);
                assert!(!turn.turn_is_formatted);
            }
            other => panic!("expected Turn, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_turn_defaults() {
        let msg = parse_inbound(r#"{"type":"Turn","turn_order":0}"#).unwrap();
        match msg {
            InboundMessage::Turn(turn) => {
                assert_eq!(turn.transcript, "");
                assert!(!turn.end_of_turn);
            }
            other => panic!("expected Turn, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_termination() {
        let msg = parse_inbound(r#"{"type":"Termination","audio_duration_seconds":12.5}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Termination {
                audio_duration_seconds: Some(12.5)
            }
        );
    }

    #[test]
    fn test_malformed_message_is_protocol_error() {
        let err = parse_inbound("not json").unwrap_err();
        assert!(matches!(err, StreamcapError::Protocol { .. }));

        let err = parse_inbound(r#"{"type":"Mystery"}"#).unwrap_err();
        assert!(matches!(err, StreamcapError::Protocol { .. }));
    }

    #[test]
    fn test_stream_url_shape() {
        let url = stream_url("streaming.example.com", 16000, "key123");
        assert_eq!(
            url,
            "wss://streaming.example.com/v3/ws?sample_rate=16000&format_turns=true&token=key123"
        );
    }

    #[test]
    fn test_terminate_message_round_trips() {
        let value: serde_json::Value = serde_json::from_str(&terminate_message()).unwrap();
        assert_eq!(value["type"], "Terminate");
    }
}
