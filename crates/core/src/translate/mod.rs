//! Translation boundary.
//!
//! A pluggable [`TranslationProvider`] behind the [`TranslationService`]
//! facade, plus the [`chunker`] logic that batches newly recognized text
//! before each provider call.

pub mod chunker;
mod openai;

pub use chunker::TranslationChunker;
pub use openai::{OpenAiProvider, OpenAiProviderConfig};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::language::LanguageTag;

/// Trace metadata attached to each translation call for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct TranslationMetadata {
    pub stream_id: Option<String>,
    pub trace_id: Option<String>,
}

/// Call contract of the external translation model.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate `text` from `source` to `target`.
    ///
    /// `context` carries the previously translated chunk so the model keeps
    /// already-shown subtitles stable across calls.
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
        context: Option<&str>,
        metadata: &TranslationMetadata,
    ) -> Result<String>;
}

/// Facade over the configured provider.
#[derive(Clone)]
pub struct TranslationService {
    provider: Arc<dyn TranslationProvider>,
}

impl TranslationService {
    pub fn new(provider: Arc<dyn TranslationProvider>) -> Self {
        Self { provider }
    }

    pub async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
        context: Option<&str>,
        metadata: &TranslationMetadata,
    ) -> Result<String> {
        self.provider
            .translate(text, source, target, context, metadata)
            .await
    }
}
