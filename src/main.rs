use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use view_coordinator::capture::{CaptureProvider, FixedCaptureProvider};
use view_coordinator::config::CoordinatorConfig;
use view_coordinator::directory::PeerId;
use view_coordinator::host::{HostCommand, HostSettings};
use view_coordinator::{Coordinator, Input};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Headless view coordinator
///
/// Reads JSON-line inputs on stdin and writes every coordinator event as a
/// JSON line on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "view-coordinator")]
#[command(version, about = "Client-side view-state coordinator for video sessions", long_about = None)]
struct CliArgs {
    /// Coordinator configuration file (JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host settings payload applied at startup (JSON)
    #[arg(short = 's', long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Device list and capture script for the headless backend (JSON)
    #[arg(short = 'd', long, value_name = "FILE")]
    devices: Option<PathBuf>,

    /// Local peer identifier (random if omitted)
    #[arg(long, value_name = "ID")]
    peer_id: Option<String>,

    /// Join as moderator (overrides config)
    #[arg(long)]
    privileged: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Log format on stderr
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose, args.log_format);

    tracing::info!("Starting view-coordinator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = CoordinatorConfig::load_or_default(args.config.as_deref()).await?;
    if args.privileged {
        config.session.privileged = true;
    }

    let capture: Arc<dyn CaptureProvider> = match &args.devices {
        Some(path) => Arc::new(FixedCaptureProvider::from_file(path).await?),
        None => {
            tracing::warn!("No device file given, starting without capture devices");
            Arc::new(FixedCaptureProvider::default())
        }
    };

    let peer_id = PeerId::new(
        args.peer_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    );
    let coordinator = Coordinator::spawn(config, peer_id, capture)?;

    let writer = tokio::spawn(write_events(coordinator.subscribe()));

    if let Some(path) = &args.settings {
        let raw = tokio::fs::read_to_string(path).await?;
        let settings: HostSettings = serde_json::from_str(&raw)?;
        if let Err(e) = coordinator.host(HostCommand::Settings(settings)).await {
            tracing::error!("Session start failed: {}", e);
        }
    }

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Input closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Input>(&line) {
                    Ok(input) => coordinator.dispatch(input).await?,
                    Err(e) => tracing::warn!("Ignoring malformed input: {}", e),
                }
            }
        }
    }

    coordinator.shutdown().await?;
    drop(coordinator);

    // The writer ends once the coordinator task drops the event bus
    if tokio::time::timeout(Duration::from_secs(2), writer).await.is_err() {
        tracing::warn!("Event writer did not finish in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Forward every event to stdout as one JSON line
async fn write_events(mut events: broadcast::Receiver<view_coordinator::events::CoordinatorEvent>) {
    let mut stdout = tokio::io::stdout();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Event writer lagged, {} events dropped", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", event.event_name(), e);
                continue;
            }
        };
        line.push(b'\n');

        if let Err(e) = stdout.write_all(&line).await {
            tracing::error!("Failed to write event: {}", e);
            break;
        }
        let _ = stdout.flush().await;
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8, format: LogFormat) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "view_coordinator=error",
        LogLevel::Warn => "view_coordinator=warn",
        LogLevel::Info => "view_coordinator=info",
        LogLevel::Verbose => "view_coordinator=debug,view_coordinator::tiles=info",
        LogLevel::Debug => "view_coordinator=debug",
        LogLevel::Trace => "view_coordinator=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
