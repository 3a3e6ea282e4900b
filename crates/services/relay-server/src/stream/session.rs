//! Per-broadcast session state.
//!
//! A [`StreamSession`] owns everything one broadcast needs: the audio-source
//! connection, the subscriber set, the transcribing flag, and the resources
//! of the current pipeline run (audio channel sender, cancel handle,
//! watchdog task). Run resources are replaced wholesale on every (re)start
//! so two runs can never share a buffer or cancel handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use livecast_core::protocol::{ErrorMessage, ServerMessage};
use livecast_core::{CancelHandle, LanguageTag};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use super::StreamId;

/// Bound on buffered audio chunks between socket and recognizer.
pub const AUDIO_CHANNEL_CAPACITY: usize = 256;

/// Unique identifier of one connected socket.
pub type ConnectionId = Uuid;

/// Handle for pushing outbound frames to one connected socket.
///
/// Cloneable; the actual socket sink is drained by the connection's forward
/// task, so sends never block on the network.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn send(&self, msg: &ServerMessage) {
        self.send_text(msg.to_json()).await;
    }

    pub async fn send_error(&self, error: &str) {
        self.send_text(ErrorMessage::new(error).to_json()).await;
    }

    pub async fn send_text(&self, text: String) {
        if self.tx.send(Message::Text(text)).await.is_err() {
            debug!(connection_id = %self.id, "Dropping message for closed connection");
        }
    }

    pub async fn send_raw(&self, msg: Message) {
        let _ = self.tx.send(msg).await;
    }

    /// Queue a close frame; the forward task stops after sending it.
    pub async fn close(&self) {
        let _ = self.tx.send(Message::Close(None)).await;
    }
}

/// The unit of state for one broadcast.
pub struct StreamSession {
    /// Stream identifier, stable across pause/resume.
    pub id: StreamId,

    /// When the session was created, for diagnostics.
    pub created_at: DateTime<Utc>,

    /// The one socket authorized to push audio for this stream.
    audio_source: ConnectionHandle,

    /// Sockets receiving broadcast output.
    subscribers: RwLock<HashMap<ConnectionId, ConnectionHandle>>,

    /// True while the pipeline should forward results.
    is_transcribing: AtomicBool,

    /// Target language of the current run; absent means pass-through.
    target_language: RwLock<Option<LanguageTag>>,

    /// Write side of the current run's audio channel.
    audio_tx: Mutex<Option<mpsc::Sender<Bytes>>>,

    /// Cancellation bound to the current recognizer invocation.
    cancel: Mutex<Option<CancelHandle>>,

    /// Currently armed inactivity watchdog.
    inactivity_timer: Mutex<Option<JoinHandle<()>>>,
}

impl StreamSession {
    pub fn new(id: StreamId, audio_source: ConnectionHandle) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            audio_source,
            subscribers: RwLock::new(HashMap::new()),
            is_transcribing: AtomicBool::new(false),
            target_language: RwLock::new(None),
            audio_tx: Mutex::new(None),
            cancel: Mutex::new(None),
            inactivity_timer: Mutex::new(None),
        }
    }

    pub fn is_transcribing(&self) -> bool {
        self.is_transcribing.load(Ordering::SeqCst)
    }

    pub fn set_transcribing(&self, value: bool) {
        self.is_transcribing.store(value, Ordering::SeqCst);
    }

    pub fn audio_source(&self) -> &ConnectionHandle {
        &self.audio_source
    }

    pub async fn target_language(&self) -> Option<LanguageTag> {
        self.target_language.read().await.clone()
    }

    pub async fn set_target_language(&self, language: Option<LanguageTag>) {
        *self.target_language.write().await = language;
    }

    pub async fn add_subscriber(&self, conn: ConnectionHandle) {
        if conn.id() == self.audio_source.id() {
            warn!(stream_id = %self.id, "Refusing to subscribe the audio source to its own stream");
            return;
        }
        self.subscribers.write().await.insert(conn.id(), conn);
    }

    pub async fn remove_subscriber(&self, id: &ConnectionId) -> bool {
        self.subscribers.write().await.remove(id).is_some()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Tear down the previous run's resources and hand out fresh ones.
    ///
    /// The old cancel handle is aborted and the old audio channel dropped
    /// unconditionally: a new run must never share either with its
    /// predecessor.
    pub async fn begin_run(&self) -> (mpsc::Receiver<Bytes>, CancelHandle) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.abort();
        }
        self.audio_tx.lock().await.take();

        let (tx, rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
        *self.audio_tx.lock().await = Some(tx);

        let cancel = CancelHandle::new();
        *self.cancel.lock().await = Some(cancel.clone());

        self.set_transcribing(true);
        (rx, cancel)
    }

    /// Append one audio chunk to the current run's buffer.
    ///
    /// Returns false when the chunk cannot land at all: not transcribing, no
    /// live channel, or the consumer is gone. A full channel drops the chunk
    /// but still counts as a live buffer.
    pub async fn write_audio(&self, chunk: Bytes) -> bool {
        if !self.is_transcribing() {
            return false;
        }
        let guard = self.audio_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => match tx.try_send(chunk) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(stream_id = %self.id, "Audio channel full, dropping chunk");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
            None => false,
        }
    }

    /// Stop transcription: flag off, current run aborted, handle cleared.
    pub async fn stop(&self) {
        self.set_transcribing(false);
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.abort();
        }
    }

    /// Suspend without ending; the pipeline notices at its next suspension
    /// point and winds itself down.
    pub fn pause(&self) {
        self.set_transcribing(false);
    }

    /// Whether a pipeline run currently owns this session's resources.
    pub async fn has_active_run(&self) -> bool {
        self.cancel.lock().await.is_some()
    }

    /// Pipeline cleanup: end the audio channel and clear the cancel handle.
    ///
    /// Skipped only when a newer run already owns fresh resources; a handle
    /// cleared by `stop` still gets its buffer ended here.
    pub async fn clear_run(&self, run_cancel: &CancelHandle) {
        let mut cancel = self.cancel.lock().await;
        let owned_by_newer_run = cancel
            .as_ref()
            .is_some_and(|current| !current.same_handle(run_cancel));
        if owned_by_newer_run {
            return;
        }
        cancel.take();
        self.audio_tx.lock().await.take();
    }

    /// Send a message to every subscriber and the audio source, in emission
    /// order per socket.
    pub async fn broadcast(&self, msg: &ServerMessage) {
        let text = msg.to_json();
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            subscriber.send_text(text.clone()).await;
        }
        drop(subscribers);
        self.audio_source.send_text(text).await;
    }

    /// Arm the inactivity watchdog, superseding any pending one.
    pub async fn set_inactivity_timer(&self, watchdog: JoinHandle<()>) {
        if let Some(previous) = self.inactivity_timer.lock().await.replace(watchdog) {
            previous.abort();
        }
    }

    pub async fn clear_inactivity_timer(&self) {
        if let Some(watchdog) = self.inactivity_timer.lock().await.take() {
            watchdog.abort();
        }
    }

    /// Notify every subscriber the broadcast ended and close their sockets.
    pub async fn notify_end(&self) {
        let msg = ServerMessage::End {
            stream_id: self.id.clone(),
        };
        let mut subscribers = self.subscribers.write().await;
        for (_, subscriber) in subscribers.drain() {
            subscriber.send(&msg).await;
            subscriber.close().await;
        }
    }

    /// Release everything the session holds: watchdog, audio channel,
    /// in-flight recognizer call.
    pub async fn teardown(&self) {
        self.set_transcribing(false);
        self.clear_inactivity_timer().await;
        self.audio_tx.lock().await.take();
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.abort();
        }
    }
}
