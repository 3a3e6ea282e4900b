//! Speech recognizer boundary.
//!
//! The relay treats the recognizer as a black box behind [`SpeechRecognizer`]:
//! raw PCM chunks go in through a bounded channel, a stream of
//! [`TranscriptEvent`]s comes out, and the whole invocation is torn down when
//! the bound [`CancelHandle`] fires. Closing the audio channel (dropping all
//! senders) signals end of input.

mod ws;

pub use ws::{WsRecognizer, WsRecognizerConfig};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::cancel::CancelHandle;
use crate::error::Result;
use crate::language::LanguageTag;

/// Kind of a recognized token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Word,
    Punctuation,
}

/// One recognized token of the current utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub content: String,
}

impl TranscriptItem {
    pub fn word(content: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Word,
            content: content.into(),
        }
    }

    pub fn punctuation(content: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Punctuation,
            content: content.into(),
        }
    }
}

/// One hypothesis from the recognizer.
///
/// `items` and `transcript` are cumulative for the current utterance; a
/// partial event may be revised by the next one, a non-partial event is
/// stable and starts a fresh utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    #[serde(default)]
    pub items: Vec<TranscriptItem>,
    #[serde(default)]
    pub transcript: String,
    pub is_partial: bool,
}

/// Parameters for opening one streaming recognition session.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Source language of the audio.
    pub language: LanguageTag,

    /// Media encoding declaration; the relay only ever sends raw PCM.
    pub media_encoding: MediaEncoding,

    /// Sample rate of the inbound audio.
    pub sample_rate_hz: u32,

    /// Ask the recognizer to stabilize partials (less flickery hypotheses).
    pub enable_partial_results_stabilization: bool,

    /// Optional custom vocabulary/model hint.
    pub vocabulary_name: Option<String>,
}

/// Audio encodings the recognizer contract covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEncoding {
    /// 16-bit little-endian PCM.
    Pcm,
}

impl StreamRequest {
    /// Request for the relay's fixed audio format: PCM, 44.1 kHz, stabilized
    /// partials on.
    pub fn new(language: LanguageTag) -> Self {
        Self {
            language,
            media_encoding: MediaEncoding::Pcm,
            sample_rate_hz: 44_100,
            enable_partial_results_stabilization: true,
            vocabulary_name: None,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: Option<String>) -> Self {
        self.vocabulary_name = vocabulary;
        self
    }
}

/// The chunk-in/result-stream-out contract of the external recognizer.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open one streaming recognition session.
    ///
    /// Consumes `audio_rx` until it closes, emits results on the returned
    /// channel, and shuts the session down when `cancel` fires. The returned
    /// channel closing is the only end-of-results signal; upstream failures
    /// are logged by the implementation and also close the channel.
    async fn start_stream(
        &self,
        request: StreamRequest,
        audio_rx: mpsc::Receiver<Bytes>,
        cancel: CancelHandle,
    ) -> Result<mpsc::Receiver<TranscriptEvent>>;
}

/// Rebuild display text from recognized items.
///
/// Words are joined by single spaces; punctuation attaches to the preceding
/// word without a space.
pub fn reconstruct_transcript(items: &[TranscriptItem]) -> String {
    let mut out = String::new();
    for item in items {
        match item.kind {
            ItemKind::Word => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&item.content);
            }
            ItemKind::Punctuation => out.push_str(&item.content),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_joins_words_with_spaces() {
        let items = vec![TranscriptItem::word("hello"), TranscriptItem::word("world")];
        assert_eq!(reconstruct_transcript(&items), "hello world");
    }

    #[test]
    fn test_reconstruct_attaches_punctuation() {
        let items = vec![
            TranscriptItem::word("hello"),
            TranscriptItem::punctuation(","),
            TranscriptItem::word("world"),
            TranscriptItem::punctuation("."),
        ];
        assert_eq!(reconstruct_transcript(&items), "hello, world.");
    }

    #[test]
    fn test_reconstruct_empty() {
        assert_eq!(reconstruct_transcript(&[]), "");
    }

    #[test]
    fn test_item_wire_shape() {
        let json = serde_json::to_string(&TranscriptItem::punctuation(".")).unwrap();
        assert_eq!(json, r#"{"type":"punctuation","content":"."}"#);
    }
}
