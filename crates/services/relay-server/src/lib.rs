//! Livecast relay server.
//!
//! Relays live audio from one broadcaster to many viewers over a single
//! bidirectional WebSocket protocol: inbound binary frames are fed to an
//! external streaming recognizer, recognized segments are optionally
//! translated, and the resulting transcript messages fan out to every
//! subscribed socket. Each broadcast is one [`stream::StreamSession`] in the
//! injected [`stream::StreamRegistry`]; the per-socket protocol lives in
//! [`dispatcher`], the per-run recognizer consumption in [`pipeline`], and
//! the keep-alive watchdog in [`monitor`].

pub mod config;
pub mod dispatcher;
pub mod monitor;
pub mod pipeline;
pub mod server;
pub mod stream;
