//! WebSocket listener.
//!
//! Accepts inbound connections and hands each socket to the dispatcher.

use std::sync::Arc;

use livecast_core::recognizer::SpeechRecognizer;
use livecast_core::translate::TranslationService;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::RelayConfig;
use crate::dispatcher;
use crate::stream::StreamRegistry;

/// State shared by every connection.
pub struct SharedState {
    pub registry: StreamRegistry,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub translator: TranslationService,
    pub config: RelayConfig,
}

impl SharedState {
    pub fn new(
        registry: StreamRegistry,
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: TranslationService,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry,
            recognizer,
            translator,
            config,
        }
    }
}

/// Relay server errors
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    #[error("Failed to bind: {0}")]
    Bind(String),
}

/// Bind `addr` and serve until the shutdown signal fires.
pub async fn run(
    addr: String,
    state: Arc<SharedState>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RelayServerError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayServerError::Bind(format!("{}: {}", addr, e)))?;
    match listener.local_addr() {
        Ok(local_addr) => info!("Relay listening on ws://{}", local_addr),
        Err(_) => info!("Relay listening on ws://{}", addr),
    }
    serve(listener, state, shutdown_rx).await;
    Ok(())
}

/// Accept loop over an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    state: Arc<SharedState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer_addr)) => {
                    debug!("Accepted connection from {}", peer_addr);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher::handle_connection(stream, state).await {
                            debug!("Connection from {} ended with error: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            },
            _ = shutdown_rx.recv() => {
                info!("Relay server shutting down");
                break;
            }
        }
    }
}
