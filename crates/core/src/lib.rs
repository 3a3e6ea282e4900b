//! Core building blocks for the Livecast relay.
//!
//! This crate holds everything the relay server shares with tooling and
//! tests: the JSON wire protocol spoken over the broadcaster/viewer
//! WebSocket, the speech-recognizer boundary (a chunk-in/result-stream-out
//! contract plus a concrete streaming WebSocket client), and the translation
//! boundary (a pluggable provider behind a service facade, together with the
//! incremental chunking logic that batches recognized text before each
//! translation call).

pub mod cancel;
pub mod error;
pub mod language;
pub mod protocol;
pub mod recognizer;
pub mod translate;

pub use cancel::CancelHandle;
pub use error::{Error, Result};
pub use language::LanguageTag;
