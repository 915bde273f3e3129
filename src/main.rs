use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use axum_server::tls_rustls::RustlsConfig;
use lofi_radio::{
    PlayerConfig, ServerConfig, SlotIndex,
    player::{AudioBackend, ClipSource, CrossfadeEngine, EngineState, HeadlessBackend, HttpClipSource},
    routes,
    state::AppState,
};

/// Lofi radio - gapless generated lofi, served and played back with a crossfade
#[derive(Parser, Debug)]
#[command(name = "lofi-radio")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the clip server
    Serve,

    /// Generate and cache clips without starting the server
    Generate {
        /// Only warm this slot
        #[arg(short = 'i', long = "index")]
        index: Option<usize>,
    },

    /// Connect to a clip server and play the stream
    Listen {
        /// Delivery endpoint URL (overrides LOFI_STREAM_URL)
        #[arg(short = 'u', long = "url")]
        url: Option<String>,

        /// Simulate playback without an audio device
        #[arg(long = "headless")]
        headless: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Must happen before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(load_server_config(cli.config)?).await,
        Commands::Generate { index } => generate(load_server_config(cli.config)?, index).await,
        Commands::Listen { url, headless } => listen(url, headless).await,
    }
}

fn load_server_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    if let Some(config_path) = path {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let address = config.address();
    let tls_config = config.tls.clone();
    let is_tls_enabled = config.is_tls_enabled();
    let rate_limit_rps = config.rate_limit_requests_per_second;
    let rate_limit_burst = config.rate_limit_burst_size;
    println!("Starting server on {address}");

    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to build clip generator: {}", e))?;

    // Configure rate limiting (disabled when rate >= 100000 for load testing)
    let governor_layer = if rate_limit_rps < 100000 {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(rate_limit_rps as u64)
            .burst_size(rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Invalid rate limit configuration"))?;
        Some(GovernorLayer::new(governor_config))
    } else {
        println!("Rate limiting disabled (rate >= 100000/s)");
        None
    };

    let app = routes::create_app(app_state).layer(tower::util::option_layer(governor_layer));

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    if is_tls_enabled {
        let tls = tls_config.ok_or_else(|| anyhow!("TLS enabled without certificate paths"))?;

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}

/// Warm the cache for one slot, or every slot in catalog order.
async fn generate(config: ServerConfig, index: Option<usize>) -> anyhow::Result<()> {
    let state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to build clip generator: {}", e))?;
    let orchestrator = &state.orchestrator;

    let slots: Vec<SlotIndex> = match index {
        Some(index) => vec![SlotIndex::new(index)],
        None => orchestrator.catalog().iter().map(|entry| entry.index).collect(),
    };

    let mut failures = 0;
    for slot in slots {
        match orchestrator.acquire(slot).await {
            Ok(clip) => println!("Slot {slot}: {} bytes cached", clip.len()),
            Err(e) => {
                failures += 1;
                eprintln!("Slot {slot}: {e}");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} slot(s) failed to generate");
    }
    Ok(())
}

async fn listen(url: Option<String>, headless: bool) -> anyhow::Result<()> {
    let mut config = PlayerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(url) = url {
        config = config.with_stream_url(url);
    }

    let source: Arc<dyn ClipSource> = Arc::new(
        HttpClipSource::new(&config.stream_url, config.request_timeout)
            .map_err(|e| anyhow!(e.to_string()))?,
    );

    // Keeps the output device open for the whole session
    let (_output, backend) = if headless {
        (None, Arc::new(HeadlessBackend::new()) as Arc<dyn AudioBackend>)
    } else {
        device_backend()?
    };

    info!(url = %config.stream_url, "Connecting to clip server");
    let engine = CrossfadeEngine::spawn(source, backend, config.engine_config());
    let mut status = engine.subscribe();
    engine.play()?;

    println!("Commands: play, pause, toggle (or empty line), quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let result = match line.trim() {
                    "play" => engine.play(),
                    "pause" => engine.pause(),
                    "" | "toggle" => engine.toggle(),
                    "quit" | "exit" => break,
                    other => {
                        println!("Unknown command '{other}'");
                        Ok(())
                    }
                };
                result?;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                match (&current.last_error, current.state) {
                    (Some(error), EngineState::Idle) => {
                        println!("Stopped: {error}. Type 'play' to retry.");
                    }
                    (_, state) => {
                        let slot = current
                            .last_slot
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!("[{state:?}] slot {slot}, {} clip(s) played", current.clips_played);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    engine.shutdown().await;
    Ok(())
}

#[cfg(feature = "device-playback")]
fn device_backend() -> anyhow::Result<(Option<rodio::OutputStream>, Arc<dyn AudioBackend>)> {
    let (stream, backend) =
        lofi_radio::player::RodioBackend::try_default().map_err(|e| anyhow!(e.to_string()))?;
    Ok((Some(stream), Arc::new(backend)))
}

#[cfg(not(feature = "device-playback"))]
fn device_backend() -> anyhow::Result<(Option<()>, Arc<dyn AudioBackend>)> {
    tracing::warn!("Built without device-playback; simulating playback");
    Ok((None, Arc::new(HeadlessBackend::new())))
}
