//! Wire protocol frames exchanged with broadcasters and viewers.
//!
//! Text frames carry these JSON messages; binary frames carry raw audio
//! (16-bit little-endian PCM, mono, 44.1 kHz) and never appear here. Field
//! names (`streamID`, `isPartial`) are part of the protocol and kept as-is.

use serde::{Deserialize, Serialize};

use crate::language::LanguageTag;

/// Messages a client sends as JSON text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin or resume broadcasting.
    Start {
        /// Client-side hint; a fresh id is always minted regardless.
        #[serde(rename = "streamID", default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<LanguageTag>,
    },

    /// Join an existing broadcast as a viewer.
    Subscribe {
        #[serde(rename = "streamID")]
        stream_id: String,
    },

    /// End broadcasting.
    Stop {
        #[serde(rename = "streamID", default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
    },

    /// Suspend broadcasting without ending the stream.
    Pause,

    /// Restart the pipeline with a new target language.
    ChangeLanguage { language: LanguageTag },
}

/// Messages the server sends as JSON text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Assigns the newly created stream id to its broadcaster.
    #[serde(rename = "streamID")]
    StreamId {
        #[serde(rename = "streamID")]
        stream_id: String,
    },

    /// A recognized (or translated) segment.
    #[serde(rename = "transcript")]
    Transcript {
        transcript: String,
        #[serde(rename = "isPartial")]
        is_partial: bool,
        #[serde(rename = "streamID")]
        stream_id: String,
    },

    /// The broadcast ended; sent to viewers before their socket closes.
    #[serde(rename = "end")]
    End {
        #[serde(rename = "streamID")]
        stream_id: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Serialization of these variants cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Protocol-violation reply; the socket is closed right after sending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_round_trip() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start","language":"et-EE"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Start {
                stream_id: None,
                language: Some(LanguageTag::new("et-EE")),
            }
        );
    }

    #[test]
    fn test_start_accepts_stream_id_hint() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start","streamID":"abc"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Start {
                stream_id: Some("abc".to_string()),
                language: None,
            }
        );
    }

    #[test]
    fn test_change_language_wire_tag() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"change_language","language":"de-DE"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ChangeLanguage {
                language: LanguageTag::new("de-DE"),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_stream_id_wire_shape() {
        let json = ServerMessage::StreamId {
            stream_id: "abc-123".to_string(),
        }
        .to_json();
        assert_eq!(json, r#"{"type":"streamID","streamID":"abc-123"}"#);
    }

    #[test]
    fn test_transcript_wire_shape() {
        let json = ServerMessage::Transcript {
            transcript: "hello world".to_string(),
            is_partial: false,
            stream_id: "abc".to_string(),
        }
        .to_json();
        assert_eq!(
            json,
            r#"{"type":"transcript","transcript":"hello world","isPartial":false,"streamID":"abc"}"#
        );
    }

    #[test]
    fn test_end_wire_shape() {
        let json = ServerMessage::End {
            stream_id: "abc".to_string(),
        }
        .to_json();
        assert_eq!(json, r#"{"type":"end","streamID":"abc"}"#);
    }

    #[test]
    fn test_error_wire_shape() {
        assert_eq!(
            ErrorMessage::new("Invalid streamID").to_json(),
            r#"{"error":"Invalid streamID"}"#
        );
    }
}
