//! room-bridge - Main Entry Point
//!
//! Runs a bridge against the configured broker, publishes a single message,
//! or validates the configuration.

use clap::{Parser, Subcommand};
use room_bridge::bridge::{Bridge, ConnectionState, LogSink};
use room_bridge::config::BridgeConfig;
use room_bridge::observability::{init_default_logging, metrics};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bridge a participant into a shared MQTT room topic
#[derive(Parser)]
#[command(name = "room-bridge")]
#[command(about = "Bridge a participant into a shared MQTT room topic")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the configured client identity
    #[arg(long, env = "ROOM_BRIDGE_IDENTITY", global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the room and report perceived messages until interrupted
    Run,
    /// Publish one message to the room and exit
    Send {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        performative: String,
        #[arg(long)]
        content: String,
    },
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    apply_verbosity(cli.verbose);
    init_default_logging();

    info!("Starting room-bridge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Some(identity) = cli.identity {
        config.bridge.identity = identity;
        if let Err(e) = config.validate() {
            error!("Invalid identity override: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Send {
            sender,
            performative,
            content,
        } => send_once(config, &sender, &performative, &content).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

/// Map `-v` flags onto LOG_LEVEL unless it is set explicitly
fn apply_verbosity(verbose: u8) {
    if verbose == 0 || std::env::var("LOG_LEVEL").is_ok() {
        return;
    }
    let level = if verbose == 1 { "DEBUG" } else { "TRACE" };
    std::env::set_var("LOG_LEVEL", level);
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["bridge.toml", "config/bridge.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create bridge.toml".into())
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Bridge starting with identity: {}", config.bridge.identity);

    let sink = Arc::new(LogSink::new(config.bridge.identity.clone()));
    let bridge = Bridge::from_config(&config, sink);
    bridge.start_with_config(&config).await?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Bridge is running on topic {}", config.mqtt.topic);

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = wait_for_disconnect(bridge.watch_state()) => {
            error!("Connection permanently lost, shutting down bridge...");
        }
    }

    bridge.shutdown().await?;
    log_metrics_snapshot();
    Ok(())
}

/// Resolves once the bridge settles in `Disconnected`
async fn wait_for_disconnect(mut state_rx: watch::Receiver<ConnectionState>) {
    loop {
        if *state_rx.borrow_and_update() == ConnectionState::Disconnected {
            break;
        }
        if state_rx.changed().await.is_err() {
            break;
        }
    }
}

async fn send_once(
    mut config: BridgeConfig,
    sender: &str,
    performative: &str,
    content: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    // A distinct client id keeps a running bridge with the same identity connected
    config.bridge.identity = format!("{}-send-{}", config.bridge.identity, Uuid::new_v4().simple());

    let sink = Arc::new(LogSink::new(config.bridge.identity.clone()));
    let bridge = Bridge::from_config(&config, sink);
    bridge.start_with_config(&config).await?;

    let result = bridge.send(sender, performative, content).await;
    if let Err(e) = bridge.shutdown().await {
        warn!("Shutdown after send failed: {}", e);
    }
    log_metrics_snapshot();

    result?;
    Ok(())
}

fn handle_config_command(
    config: &BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    } else {
        println!("Configuration is valid");
    }
    Ok(())
}

fn log_metrics_snapshot() {
    match serde_json::to_string(&metrics().get_metrics()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Final metrics"),
        Err(e) => warn!("Failed to serialize metrics: {}", e),
    }
}
