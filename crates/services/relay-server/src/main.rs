//! Relay server binary entry point.
//!
//! Starts the Livecast WebSocket relay: broadcasters push audio, viewers
//! subscribe by stream id, and recognized (optionally translated) segments
//! fan out to everyone attached.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p livecast-relay-server -- \
//!   --bind-address 0.0.0.0:3000 \
//!   --recognizer-url wss://recognizer.example.com/v1/stream \
//!   --source-language en-US
//! ```
//!
//! Credentials are normally supplied through the environment:
//! `RECOGNIZER_API_KEY`, `OPENAI_API_KEY`.

use std::sync::Arc;

use clap::Parser;
use livecast_core::recognizer::{WsRecognizer, WsRecognizerConfig};
use livecast_core::translate::{OpenAiProvider, OpenAiProviderConfig, TranslationService};
use livecast_core::LanguageTag;
use livecast_relay_server::config::RelayConfig;
use livecast_relay_server::server::{self, SharedState};
use livecast_relay_server::stream::StreamRegistry;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Livecast relay server
///
/// Real-time transcription/translation relay over a single WebSocket
/// surface.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket bind address
    #[arg(long, default_value = "0.0.0.0:3000", env = "RELAY_BIND_ADDRESS")]
    bind_address: String,

    /// Streaming recognizer WebSocket endpoint
    #[arg(long, env = "RECOGNIZER_URL")]
    recognizer_url: String,

    /// Recognizer API key
    #[arg(long, env = "RECOGNIZER_API_KEY", default_value = "")]
    recognizer_api_key: String,

    /// Custom vocabulary/model hint passed to the recognizer
    #[arg(long, env = "RECOGNIZER_VOCABULARY")]
    vocabulary: Option<String>,

    /// Source language of broadcast audio
    #[arg(long, default_value = "en-US", env = "SOURCE_LANGUAGE")]
    source_language: String,

    /// Translation API key
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    openai_api_key: String,

    /// Translation model
    #[arg(long, default_value = "gpt-4o-mini", env = "TRANSLATION_MODEL")]
    translation_model: String,

    /// Translation API base URL
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "OPENAI_BASE_URL"
    )]
    openai_base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %args.bind_address,
        source_language = %args.source_language,
        "Livecast relay server starting"
    );

    let recognizer = Arc::new(WsRecognizer::new(WsRecognizerConfig {
        endpoint: args.recognizer_url.clone(),
        api_key: args.recognizer_api_key.clone(),
    }));

    let provider = OpenAiProvider::new(
        OpenAiProviderConfig::new(args.openai_api_key.clone())
            .with_base_url(args.openai_base_url.clone())
            .with_model(args.translation_model.clone()),
    );
    let translator = TranslationService::new(Arc::new(provider));

    let config = RelayConfig {
        source_language: LanguageTag::new(args.source_language.clone()),
        vocabulary: args.vocabulary.clone(),
    };

    let state = Arc::new(SharedState::new(
        StreamRegistry::new(),
        recognizer,
        translator,
        config,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server_task = tokio::spawn(server::run(args.bind_address.clone(), state, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    server_task.await??;

    info!("Relay server shut down gracefully");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
