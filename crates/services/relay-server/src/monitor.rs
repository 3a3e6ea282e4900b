//! Inactivity watchdog.
//!
//! Streaming recognizers idle out when no audio arrives for a while. The
//! watchdog injects a minimal silence payload into the audio channel
//! whenever a stream goes quiet, keeping the recognizer's network stream
//! alive through pauses in speech. One watchdog task is armed per stream
//! and superseded on every real audio chunk.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::stream::StreamSession;

/// How long without real audio before silence is injected.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(14);

/// Delay between a received audio frame and the watchdog re-arm, giving the
/// chunk time to land in the audio channel first.
pub const RESET_DEBOUNCE: Duration = Duration::from_secs(2);

/// Minimal silence payload written on each idle period.
pub const SILENT_AUDIO: &[u8] = &[0xF8, 0xFF, 0xFE];

/// Arm the watchdog for `session`, superseding any pending one.
pub async fn reset_inactivity_timer(session: &Arc<StreamSession>) {
    let watchdog = tokio::spawn(run_watchdog(Arc::clone(session)));
    session.set_inactivity_timer(watchdog).await;
}

/// Schedule a watchdog reset shortly after an audio frame arrives.
pub fn schedule_reset(session: Arc<StreamSession>) {
    tokio::spawn(async move {
        tokio::time::sleep(RESET_DEBOUNCE).await;
        reset_inactivity_timer(&session).await;
    });
}

/// Writes silence once per idle period for as long as the session keeps
/// transcribing into a live buffer; exits without rescheduling otherwise.
/// The next real audio chunk arms a fresh watchdog.
async fn run_watchdog(session: Arc<StreamSession>) {
    loop {
        tokio::time::sleep(INACTIVITY_TIMEOUT).await;
        if !session.is_transcribing() {
            break;
        }
        if !session.write_audio(Bytes::from_static(SILENT_AUDIO)).await {
            break;
        }
        debug!(
            stream_id = %session.id,
            timeout_secs = INACTIVITY_TIMEOUT.as_secs(),
            "No audio received, wrote silence to keep the recognizer alive"
        );
    }
}
