//! Runtime configuration for the relay service.

use livecast_core::LanguageTag;

/// Settings shared by every stream the relay hosts.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Source language of inbound broadcast audio.
    pub source_language: LanguageTag,

    /// Optional custom vocabulary/model hint passed to the recognizer.
    pub vocabulary: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source_language: LanguageTag::new("en-US"),
            vocabulary: None,
        }
    }
}
