//! OpenAI chat-completions translation provider.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TranslationMetadata, TranslationProvider};
use crate::error::{Error, Result};
use crate::language::LanguageTag;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const ADDITIONAL_INSTRUCTION: &str = "Never output any explanation, question, error message \
or reasoning, only the translation. Remove duplicate words, repetitions, and filler words \
like 'um' and similar.";

/// Connection settings for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// [`TranslationProvider`] backed by the chat completions API.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// System prompt for one translation call. When a previously translated
/// chunk is supplied the model is told to keep it stable: the output is live
/// subtitles and already-shown text should not jump around.
fn build_prompt(source: &LanguageTag, target: &LanguageTag, context: Option<&str>) -> String {
    match context {
        Some(context) => format!(
            "Translate the following text from {} to {}. You are translating live subtitles \
that get updated every few seconds. Try not to change previously translated chunks. \
Previous chunk: {} {}",
            source, target, context, ADDITIONAL_INSTRUCTION
        ),
        None => format!(
            "Translate the following text from {} to {}. {}",
            source, target, ADDITIONAL_INSTRUCTION
        ),
    }
}

#[async_trait::async_trait]
impl TranslationProvider for OpenAiProvider {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
        context: Option<&str>,
        metadata: &TranslationMetadata,
    ) -> Result<String> {
        let prompt = build_prompt(source, target, context);
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Translation(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let translated = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| Error::Translation("Empty completion response".to_string()))?;

        debug!(
            stream_id = metadata.stream_id.as_deref().unwrap_or("-"),
            source = %source,
            target = %target,
            chars = text.len(),
            "Translated chunk"
        );

        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt(
            &LanguageTag::new("en-US"),
            &LanguageTag::new("et-EE"),
            None,
        );
        assert!(prompt.starts_with("Translate the following text from en-US to et-EE."));
        assert!(!prompt.contains("Previous chunk"));
    }

    #[test]
    fn test_prompt_with_context_keeps_previous_chunk_stable() {
        let prompt = build_prompt(
            &LanguageTag::new("en-US"),
            &LanguageTag::new("et-EE"),
            Some("tere maailm"),
        );
        assert!(prompt.contains("Previous chunk: tere maailm"));
        assert!(prompt.contains("not to change previously translated chunks"));
    }
}
