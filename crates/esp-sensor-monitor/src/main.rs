/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Live sensor dashboard, headless update log, or an emulated device
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

mod tui;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use esp_sensor_feed::CounterDevice;
use esp_sensor_monitor::{MonitorConfig, WatchSession, cancel_after_updates};

use crate::tui::{LOG_BUFFER_CAPACITY, LogBuffer, LogBufferHandle, LogWriterFactory};

const TUI_EXIT_AFTER_TICKS_ENV: &str = "ESP_MONITOR_TUI_EXIT_AFTER_TICKS";

#[derive(Parser, Debug)]
#[command(name = "esp-sensor-monitor", version, about = "Live monitor for the ESP32 WebSocket sensor feed")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the device and show its readings (default)
    Watch(WatchArgs),
    /// Serve an emulated device that broadcasts an incrementing counter
    Emulate(EmulateArgs),
}

#[derive(Args, Debug, Default)]
struct WatchArgs {
    /// Device WebSocket URL, overrides `feed.url`
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Log display updates instead of drawing the dashboard
    #[arg(long)]
    headless: bool,
    /// Stop after this many counter updates
    #[arg(long = "exit-after", value_name = "COUNT")]
    exit_after: Option<u64>,
}

#[derive(Args, Debug, Default)]
struct EmulateArgs {
    /// Listen address, overrides `device.bind`
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// Broadcast interval, overrides `device.interval_ms`
    #[arg(long = "interval-ms", value_name = "MS")]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let command = args
        .command
        .unwrap_or_else(|| Command::Watch(WatchArgs::default()));

    let config = MonitorConfig::load(args.config_path.as_deref()).context("load config")?;

    match command {
        Command::Watch(watch) if !watch.headless => {
            let log_buffer: LogBufferHandle =
                Arc::new(Mutex::new(LogBuffer::new(LOG_BUFFER_CAPACITY)));
            init_tracing(&args.log_level, Some(log_buffer.clone()))?;
            run_watch(config, watch, Some(log_buffer)).await
        }
        Command::Watch(watch) => {
            init_tracing(&args.log_level, None)?;
            run_watch(config, watch, None).await
        }
        Command::Emulate(emulate) => {
            init_tracing(&args.log_level, None)?;
            run_emulate(config, emulate).await
        }
    }
}

async fn run_watch(
    mut config: MonitorConfig,
    args: WatchArgs,
    log_buffer: Option<LogBufferHandle>,
) -> Result<()> {
    if let Some(url) = args.url {
        config.feed.url = url;
    }
    config.validate().context("validate config")?;

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let session = WatchSession::start(&config.feed_config(), shutdown.clone()).await?;
    if let Some(updates) = args.exit_after {
        cancel_after_updates(session.board(), updates, shutdown.clone());
    }

    if let Some(log_buffer) = log_buffer {
        let exit_after_ticks = std::env::var(TUI_EXIT_AFTER_TICKS_ENV)
            .ok()
            .and_then(|value| value.parse::<u64>().ok());
        let result =
            tui::run_dashboard(&session, log_buffer, shutdown.clone(), exit_after_ticks).await;
        session.stop();
        result.context("run dashboard")?;
    }

    let stats = session.wait().await?;
    info!(
        updated = stats.updated,
        ignored = stats.ignored,
        failed = stats.failed,
        "watch finished"
    );
    Ok(())
}

async fn run_emulate(mut config: MonitorConfig, args: EmulateArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.device.bind = bind;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.device.interval_ms = interval_ms;
    }
    config.validate().context("validate config")?;

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let device = CounterDevice::start(config.device_config())
        .await
        .with_context(|| format!("start counter device on {}", config.device.bind))?;
    info!(
        url = %device.url(),
        interval = ?Duration::from_millis(config.device.interval_ms),
        "emulated device running"
    );

    shutdown.cancelled().await;
    info!(sent = device.sent_count(), "shutdown signal received");
    device.shutdown().await;
    Ok(())
}

fn init_tracing(log_level: &str, log_buffer: Option<LogBufferHandle>) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let result = match log_buffer {
        Some(buffer) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(LogWriterFactory::new(buffer))
            .try_init(),
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    result
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
