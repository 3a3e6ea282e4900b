//! Stream sessions and the process-wide registry.

mod registry;
mod session;

pub use registry::StreamRegistry;
pub use session::{ConnectionHandle, ConnectionId, StreamSession, AUDIO_CHANNEL_CAPACITY};

/// Opaque identifier of one broadcast stream.
pub type StreamId = String;
