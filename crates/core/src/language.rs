//! Language tags for recognition sources and translation targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tags the recognizer accepts as source languages.
pub const SOURCE_LANGUAGES: &[&str] = &["en-US", "en-GB", "es-US", "de-DE", "hi-IN"];

/// Tags the translator accepts as targets.
pub const TARGET_LANGUAGES: &[&str] = &[
    "en-US", "de-DE", "es-ES", "et-EE", "fi-FI", "fr-FR", "hi-IN", "ru-RU",
];

/// A BCP 47 style language tag (e.g. `en-US`, `et-EE`).
///
/// Kept opaque on the wire: serializes as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the tag is a known translation target.
    pub fn is_supported_target(&self) -> bool {
        TARGET_LANGUAGES.contains(&self.0.as_str())
    }

    /// Whether the tag is a known recognition source.
    pub fn is_supported_source(&self) -> bool {
        SOURCE_LANGUAGES.contains(&self.0.as_str())
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}
