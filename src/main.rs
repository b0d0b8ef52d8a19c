//! # input-event
//!
//! Print the events of a Linux input device.
//!
//! Opens `/dev/input/<device>` (waiting for it to appear if needed) and prints
//! every key, relative axis, absolute axis and sync event as a JSON line or a
//! text line until the device goes away or Ctrl+C is pressed.
//!
//! # Examples
//!
//! ```bash
//! input-event event0
//! input-event --format text --config /etc/input-event.toml
//! input-event --list
//! ```
//!
//! Expected output:
//! ```text
//! INFO input_event: input-event v0.1.0 starting...
//! INFO input_event::device::connection: Opened input device at /dev/input/event0
//! {"timestamp_seconds":1700000000,"timestamp_microseconds":250000,"raw_type":1,...}
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use input_event::codes::CodeTables;
use input_event::config::{Config, OutputFormat};
use input_event::device::{list_devices, ConnectionManager, LifecycleEvent};
use input_event::error::InputEventError;
use input_event::output::{format_event, format_lifecycle};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "input-event", version, about = "Print Linux input device events")]
struct Args {
    /// Device name under /dev/input (e.g. event0) or absolute path
    device: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// List readable input devices and exit
    #[arg(short, long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("input-event v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.list {
        for device in list_devices()? {
            println!(
                "{}\t{:04x}:{:04x}\t{}",
                device.path.display(),
                device.vendor,
                device.product,
                device.name.as_deref().unwrap_or("(unnamed)")
            );
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(device) = args.device {
        config.device.name = device;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    config.validate()?;

    run(&config).await
}

/// Print events from the configured device until it fails or Ctrl+C
async fn run(config: &Config) -> Result<()> {
    let format = config.output.format;
    let manager = ConnectionManager::new(
        config.device.name.clone(),
        config.connection_options(CodeTables::shared()),
    );
    let mut events = manager.subscribe();
    let mut lifecycle = manager.subscribe_lifecycle();

    info!("Waiting for {}", manager.path().display());
    info!("Press Ctrl+C to exit");
    let mut device = manager.spawn();

    let mut event_count: u64 = 0;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    event_count += 1;
                    println!("{}", format_event(&event, format));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },

            event = lifecycle.recv() => match event {
                Ok(event) => {
                    println!("{}", format_lifecycle(&event, format));
                    if let LifecycleEvent::Error { error: err, .. } = &event {
                        if matches!(**err, InputEventError::Read { .. }) {
                            error!("{}", err);
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    device.close().await;
    info!("Total events received: {}", event_count);

    Ok(())
}
