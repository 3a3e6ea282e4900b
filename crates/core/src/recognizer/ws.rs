//! Streaming recognizer client over WebSocket.
//!
//! Speaks the recognizer's session protocol: one JSON configuration frame
//! opens the session, audio follows as binary frames, results come back as
//! JSON text frames, and a JSON end-of-stream marker asks the service to
//! finalize once the audio channel closes.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error};

use super::{SpeechRecognizer, StreamRequest, TranscriptEvent};
use crate::cancel::CancelHandle;
use crate::error::{Error, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection settings for the recognizer service.
#[derive(Debug, Clone)]
pub struct WsRecognizerConfig {
    /// WebSocket endpoint, e.g. `wss://recognizer.example.com/v1/stream`.
    pub endpoint: String,

    /// Bearer token sent on the upgrade request.
    pub api_key: String,
}

/// [`SpeechRecognizer`] implementation over a WebSocket session.
pub struct WsRecognizer {
    config: WsRecognizerConfig,
}

impl WsRecognizer {
    pub fn new(config: WsRecognizerConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for WsRecognizer {
    async fn start_stream(
        &self,
        request: StreamRequest,
        audio_rx: mpsc::Receiver<Bytes>,
        cancel: CancelHandle,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        let mut ws_request = self
            .config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(Error::WebSocket)?;
        if !self.config.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| Error::Config(format!("Invalid recognizer API key: {}", e)))?;
            ws_request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = connect_async(ws_request).await?;
        let (mut ws_tx, ws_rx) = ws_stream.split();

        let start_frame = json!({
            "type": "start",
            "language": request.language,
            "media_encoding": request.media_encoding,
            "sample_rate_hz": request.sample_rate_hz,
            "enable_partial_results_stabilization": request.enable_partial_results_stabilization,
            "vocabulary_name": request.vocabulary_name,
        });
        ws_tx.send(Message::Text(start_frame.to_string())).await?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(write_loop(ws_tx, audio_rx, cancel.clone()));
        tokio::spawn(read_loop(ws_rx, event_tx, cancel));

        Ok(event_rx)
    }
}

/// Forwards audio chunks to the recognizer socket until the channel closes
/// or the run is aborted.
async fn write_loop(mut ws_tx: WsSink, mut audio_rx: mpsc::Receiver<Bytes>, cancel: CancelHandle) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            chunk = audio_rx.recv() => match chunk {
                Some(chunk) => {
                    if let Err(e) = ws_tx.send(Message::Binary(chunk.to_vec())).await {
                        debug!("Recognizer socket rejected audio chunk: {}", e);
                        break;
                    }
                }
                None => {
                    // Input ended; ask the recognizer to finalize.
                    let eos = json!({ "type": "end_of_stream" });
                    let _ = ws_tx.send(Message::Text(eos.to_string())).await;
                    break;
                }
            }
        }
    }
}

/// Parses result frames into transcript events until the socket closes, the
/// consumer goes away, or the run is aborted.
async fn read_loop(
    mut ws_rx: WsSource,
    event_tx: mpsc::Sender<TranscriptEvent>,
    cancel: CancelHandle,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = ws_rx.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<RecognizerFrame>(&text) {
                Ok(RecognizerFrame::Transcript(event)) => {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(RecognizerFrame::Error { message }) => {
                    error!("Recognizer reported error: {}", message);
                    break;
                }
                Err(e) => {
                    debug!("Ignoring unparseable recognizer frame: {}", e);
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                if cancel.is_aborted() {
                    debug!("Recognizer stream closed after abort: {}", e);
                } else {
                    error!("Recognizer stream error: {}", e);
                }
                break;
            }
        }
    }
}

/// Frames the recognizer sends back.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RecognizerFrame {
    Transcript(TranscriptEvent),
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageTag;
    use tokio::net::TcpListener;

    async fn accept_one(
        listener: TcpListener,
    ) -> WebSocketStream<tokio::net::TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    #[tokio::test]
    async fn test_streams_audio_and_parses_results() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let ws = accept_one(listener).await;
            let (mut tx, mut rx) = ws.split();

            // Configuration frame opens the session.
            let first = rx.next().await.unwrap().unwrap();
            let config: serde_json::Value =
                serde_json::from_str(first.to_text().unwrap()).unwrap();
            assert_eq!(config["type"], "start");
            assert_eq!(config["language"], "en-US");
            assert_eq!(config["sample_rate_hz"], 44_100);

            // One audio chunk arrives as a binary frame.
            let chunk = rx.next().await.unwrap().unwrap();
            assert!(matches!(chunk, Message::Binary(_)));

            tx.send(Message::Text(
                r#"{"type":"transcript","items":[{"type":"word","content":"hi"}],"transcript":"hi","is_partial":false}"#
                    .to_string(),
            ))
            .await
            .unwrap();

            // End-of-stream marker after the audio channel closes.
            let eos = rx.next().await.unwrap().unwrap();
            let eos: serde_json::Value = serde_json::from_str(eos.to_text().unwrap()).unwrap();
            assert_eq!(eos["type"], "end_of_stream");

            let _ = tx.send(Message::Close(None)).await;
        });

        let recognizer = WsRecognizer::new(WsRecognizerConfig {
            endpoint: format!("ws://{}", addr),
            api_key: "test-key".to_string(),
        });

        let (audio_tx, audio_rx) = mpsc::channel(8);
        let cancel = CancelHandle::new();
        let mut events = recognizer
            .start_stream(
                StreamRequest::new(LanguageTag::new("en-US")),
                audio_rx,
                cancel,
            )
            .await
            .unwrap();

        audio_tx.send(Bytes::from_static(&[0u8; 4])).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.transcript, "hi");
        assert!(!event.is_partial);

        drop(audio_tx);
        assert!(events.recv().await.is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_abort_closes_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let ws = accept_one(listener).await;
            let (_tx, mut rx) = ws.split();
            // Config frame, then the client closes after the abort.
            let _ = rx.next().await;
            while let Some(msg) = rx.next().await {
                if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        });

        let recognizer = WsRecognizer::new(WsRecognizerConfig {
            endpoint: format!("ws://{}", addr),
            api_key: String::new(),
        });

        let (_audio_tx, audio_rx) = mpsc::channel(8);
        let cancel = CancelHandle::new();
        let mut events = recognizer
            .start_stream(
                StreamRequest::new(LanguageTag::new("en-US")),
                audio_rx,
                cancel.clone(),
            )
            .await
            .unwrap();

        cancel.abort();
        assert!(events.recv().await.is_none());
        server.await.unwrap();
    }
}
