//! Per-connection protocol dispatcher.
//!
//! Each socket starts uninitialized and is assigned a role by its first
//! JSON frame: `start` makes it the audio source of a freshly minted
//! stream, `subscribe` attaches it to an existing one. The role is decided
//! once; only the stream id an audio source points at can change (on
//! `change_language`). Everything after that first frame routes through
//! [`handle_connection`]'s loop: binary frames are audio, text frames are
//! control messages, and disconnect tears the stream down or shrinks the
//! subscriber set depending on the role.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use livecast_core::protocol::{ClientMessage, ServerMessage};
use livecast_core::LanguageTag;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, Result as WsResult};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::monitor;
use crate::pipeline;
use crate::server::SharedState;
use crate::stream::{ConnectionHandle, StreamId, StreamSession};

/// Bound on queued outbound frames per connection.
const OUTBOUND_CHANNEL_CAPACITY: usize = 128;

/// How long the forward task gets to flush queued frames on disconnect.
const FORWARD_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What a socket is to the relay, decided by its first control frame.
#[derive(Debug, Clone)]
enum ConnectionRole {
    Uninitialized,
    AudioSource { stream_id: StreamId },
    Subscriber { stream_id: StreamId },
}

/// Drive one socket from accept to disconnect.
pub async fn handle_connection(stream: TcpStream, state: Arc<SharedState>) -> WsResult<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);
    let conn = ConnectionHandle::new(tx);

    // Drain queued outbound frames into the socket; stop after a close
    // frame or once every handle clone is gone.
    let mut forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if ws_tx.send(msg).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
    });

    let mut role = ConnectionRole::Uninitialized;

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match role.clone() {
                ConnectionRole::Uninitialized => {
                    match handle_initial_message(&state, &conn, &text).await {
                        Some(assigned) => role = assigned,
                        // Protocol violation; the reply and close are queued.
                        None => break,
                    }
                }
                ConnectionRole::AudioSource { stream_id } => {
                    if let Some(new_id) =
                        handle_control_message(&state, &conn, &stream_id, &text).await
                    {
                        role = ConnectionRole::AudioSource { stream_id: new_id };
                    }
                }
                ConnectionRole::Subscriber { stream_id } => {
                    debug!(stream_id = %stream_id, "Subscriber sent unexpected message");
                }
            },
            Ok(Message::Binary(data)) => {
                if let ConnectionRole::AudioSource { stream_id } = &role {
                    handle_audio_chunk(&state, stream_id, Bytes::from(data)).await;
                } else {
                    debug!("Ignoring binary frame from non-source connection");
                }
            }
            Ok(Message::Ping(data)) => conn.send_raw(Message::Pong(data)).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    handle_disconnection(&state, &conn, &role).await;

    // Let queued frames (end notifications, error replies) reach the wire
    // before the forward task goes away.
    drop(conn);
    if tokio::time::timeout(FORWARD_DRAIN_TIMEOUT, &mut forward_task)
        .await
        .is_err()
    {
        forward_task.abort();
    }

    Ok(())
}

/// First frame on an uninitialized socket: assigns the role or rejects.
async fn handle_initial_message(
    state: &Arc<SharedState>,
    conn: &ConnectionHandle,
    text: &str,
) -> Option<ConnectionRole> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            error!("Invalid JSON in initial message: {}", e);
            conn.close().await;
            return None;
        }
    };

    match msg {
        ClientMessage::Start { language, .. } => {
            // An incoming streamID hint never reuses state; a fresh id is
            // always minted.
            let stream_id = start_stream(state, conn, language).await;
            Some(ConnectionRole::AudioSource { stream_id })
        }
        ClientMessage::Subscribe { stream_id } => match state.registry.get(&stream_id).await {
            Some(session) => {
                session.add_subscriber(conn.clone()).await;
                info!(stream_id = %stream_id, "Client subscribed");
                Some(ConnectionRole::Subscriber { stream_id })
            }
            None => {
                conn.send_error("Invalid streamID").await;
                conn.close().await;
                None
            }
        },
        _ => {
            conn.send_error("Invalid message type").await;
            conn.close().await;
            None
        }
    }
}

/// Mint a new stream for `conn`, announce its id, and launch the pipeline.
async fn start_stream(
    state: &Arc<SharedState>,
    conn: &ConnectionHandle,
    language: Option<LanguageTag>,
) -> StreamId {
    let stream_id = Uuid::new_v4().to_string();
    let session = Arc::new(StreamSession::new(stream_id.clone(), conn.clone()));

    if let Some(ref language) = language {
        if !language.is_supported_target() {
            warn!(language = %language, "Unrecognized target language tag");
        }
    }
    session.set_target_language(language).await;

    state.registry.insert(Arc::clone(&session)).await;
    info!(stream_id = %stream_id, "Audio source started");

    conn.send(&ServerMessage::StreamId {
        stream_id: stream_id.clone(),
    })
    .await;

    launch_pipeline(state, &session).await;
    stream_id
}

async fn launch_pipeline(state: &Arc<SharedState>, session: &Arc<StreamSession>) {
    let (audio_rx, cancel) = session.begin_run().await;
    pipeline::spawn(Arc::clone(state), Arc::clone(session), audio_rx, cancel);
}

/// Control frame from an initialized audio source. Returns the new stream id
/// when `change_language` re-points the connection.
async fn handle_control_message(
    state: &Arc<SharedState>,
    conn: &ConnectionHandle,
    stream_id: &str,
    text: &str,
) -> Option<StreamId> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            error!(stream_id = %stream_id, "Invalid JSON in control message: {}", e);
            return None;
        }
    };

    match msg {
        ClientMessage::Stop { .. } => {
            if let Some(session) = state.registry.get(stream_id).await {
                session.stop().await;
                info!(stream_id = %stream_id, "Transcription stopped");
                conn.close().await;
            }
            None
        }
        ClientMessage::Pause => {
            if let Some(session) = state.registry.get(stream_id).await {
                session.pause();
                info!(stream_id = %stream_id, "Transcription paused");
            }
            None
        }
        ClientMessage::Start { language, .. } => {
            // Resume under the same id with a fresh buffer and run.
            if let Some(session) = state.registry.get(stream_id).await {
                if language.is_some() {
                    session.set_target_language(language).await;
                }
                launch_pipeline(state, &session).await;
                info!(stream_id = %stream_id, "Transcription resumed");
            }
            None
        }
        ClientMessage::ChangeLanguage { language } => {
            Some(change_language(state, conn, stream_id, language).await)
        }
        ClientMessage::Subscribe { .. } => {
            debug!(stream_id = %stream_id, "Audio source sent subscribe after initialization");
            None
        }
    }
}

/// Stop-then-start under a brand-new stream id on the same socket.
///
/// Viewers of the old id cannot be migrated (the protocol has no renotify
/// message), so the old stream ends for them and the old registry entry is
/// removed rather than left dangling.
async fn change_language(
    state: &Arc<SharedState>,
    conn: &ConnectionHandle,
    old_stream_id: &str,
    language: LanguageTag,
) -> StreamId {
    if let Some(old) = state.registry.remove(old_stream_id).await {
        old.pause();
        old.notify_end().await;
        old.teardown().await;
    }
    info!(old_stream_id = %old_stream_id, language = %language, "Changing language");
    start_stream(state, conn, Some(language)).await
}

/// Binary frame from the audio source.
async fn handle_audio_chunk(state: &Arc<SharedState>, stream_id: &str, chunk: Bytes) {
    if let Some(session) = state.registry.get(stream_id).await {
        // Re-arm the watchdog once the chunk has had time to land.
        monitor::schedule_reset(Arc::clone(&session));
        session.write_audio(chunk).await;
    }
}

/// Socket gone: tear the stream down or shrink the subscriber set.
async fn handle_disconnection(
    state: &Arc<SharedState>,
    conn: &ConnectionHandle,
    role: &ConnectionRole,
) {
    match role {
        ConnectionRole::Uninitialized => {}
        ConnectionRole::AudioSource { stream_id } => {
            if let Some(session) = state.registry.remove(stream_id).await {
                info!(stream_id = %stream_id, "Audio source disconnected");
                session.notify_end().await;
                session.teardown().await;
            }
        }
        ConnectionRole::Subscriber { stream_id } => {
            if let Some(session) = state.registry.get(stream_id).await {
                if session.remove_subscriber(&conn.id()).await {
                    info!(stream_id = %stream_id, "Subscriber disconnected");
                }
            }
        }
    }
}
