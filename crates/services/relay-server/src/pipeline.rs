//! Transcription pipeline.
//!
//! One run owns one recognizer invocation, one audio channel receiver and
//! one cancel handle. The run consumes the recognizer's result stream until
//! it ends, the run is aborted, or the session stops transcribing; on every
//! exit path the same cleanup releases the run's resources so a later
//! `start` can launch a fresh run.

use std::sync::Arc;

use bytes::Bytes;
use livecast_core::protocol::ServerMessage;
use livecast_core::recognizer::{reconstruct_transcript, StreamRequest};
use livecast_core::translate::{TranslationChunker, TranslationMetadata};
use livecast_core::CancelHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::server::SharedState;
use crate::stream::StreamSession;

pub fn spawn(
    state: Arc<SharedState>,
    session: Arc<StreamSession>,
    audio_rx: mpsc::Receiver<Bytes>,
    cancel: CancelHandle,
) -> JoinHandle<()> {
    tokio::spawn(run(state, session, audio_rx, cancel))
}

/// One pipeline run, from recognizer start to cleanup.
pub async fn run(
    state: Arc<SharedState>,
    session: Arc<StreamSession>,
    audio_rx: mpsc::Receiver<Bytes>,
    cancel: CancelHandle,
) {
    let stream_id = session.id.clone();
    let source = state.config.source_language.clone();
    // Matching source and target means pass-through: no translation at all.
    let target = session
        .target_language()
        .await
        .filter(|target| *target != source);

    let request = StreamRequest::new(source.clone())
        .with_vocabulary(state.config.vocabulary.clone());

    let mut events = match state
        .recognizer
        .start_stream(request, audio_rx, cancel.clone())
        .await
    {
        Ok(events) => events,
        Err(e) => {
            error!(stream_id = %stream_id, error = %e, "Failed to open recognizer stream");
            session.set_transcribing(false);
            session.clear_run(&cancel).await;
            return;
        }
    };

    info!(
        stream_id = %stream_id,
        source = %source,
        target = target.as_ref().map(|t| t.as_str()).unwrap_or("-"),
        "Transcription run started"
    );

    let mut chunker = TranslationChunker::new();
    let mut last_translated: Option<String> = None;
    let metadata = TranslationMetadata {
        stream_id: Some(stream_id.clone()),
        trace_id: None,
    };

    let outcome: livecast_core::Result<()> = async {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            // A concurrent stop/pause may have landed while we were parked.
            if !session.is_transcribing() {
                break;
            }

            match &target {
                None => {
                    let transcript = if event.items.is_empty() {
                        event.transcript
                    } else {
                        reconstruct_transcript(&event.items)
                    };
                    session
                        .broadcast(&ServerMessage::Transcript {
                            transcript,
                            is_partial: event.is_partial,
                            stream_id: stream_id.clone(),
                        })
                        .await;
                }
                Some(target) => {
                    if let Some(chunk) = chunker.absorb(&event.items, event.is_partial) {
                        let translated = state
                            .translator
                            .translate(
                                &chunk,
                                &source,
                                target,
                                last_translated.as_deref(),
                                &metadata,
                            )
                            .await?;
                        if !session.is_transcribing() {
                            break;
                        }
                        session
                            .broadcast(&ServerMessage::Transcript {
                                transcript: translated.clone(),
                                is_partial: false,
                                stream_id: stream_id.clone(),
                            })
                            .await;
                        last_translated = Some(translated);
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) if cancel.is_aborted() => {
            debug!(stream_id = %stream_id, "Transcription run aborted");
        }
        Ok(()) => {
            info!(stream_id = %stream_id, "Transcription run ended");
        }
        Err(e) => {
            // No retry here; the client resumes with a fresh `start`.
            error!(stream_id = %stream_id, error = %e, "Transcription run failed");
            session.set_transcribing(false);
        }
    }

    session.clear_run(&cancel).await;
}
