//! Bluetooth management channel driver daemon.
//!
//! Connects to the datagram socket relaying the kernel management channel,
//! runs the driver and keeps an in-memory adapter model up to date.

use anyhow::Context;
use clap::Parser;
use mgmt_session::{connect_datagram, Driver, DriverConfig};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod adapter;
mod config;
mod logging;

use adapter::LoggingAdapterManager;
use config::MgmtConfig;
use logging::MgmtLogFormatter;

const COMPONENT: &str = "driver";

/// Bluetooth management channel driver
#[derive(Parser, Debug)]
#[command(name = "btmgmtd", version, about = "Bluetooth management channel driver")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Datagram socket relaying the management channel
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Local name for every controller
    #[arg(long)]
    name: Option<String>,

    /// IO capability set on every controller (0-4)
    #[arg(long)]
    io_capability: Option<u8>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("MGMT_LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("btmgmtd={}", log_level).parse()?)
        .add_directive(format!("mgmt_session={}", log_level).parse()?)
        .add_directive(format!("mgmt_controller={}", log_level).parse()?)
        .add_directive(format!("mgmt_wire={}", log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .event_format(MgmtLogFormatter::new("mgmt"))
        .init();

    info!("Starting Bluetooth management driver v{}", env!("CARGO_PKG_VERSION"));

    let mut config = MgmtConfig::load_from_file(&args.config)?;
    if let Some(socket) = &args.socket {
        config.socket_path = socket.display().to_string();
    }
    if let Some(name) = args.name {
        config.local_name = Some(name);
    }
    if let Some(io_capability) = args.io_capability {
        config.io_capability = io_capability;
    }

    let (registered_tx, mut registered_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(LoggingAdapterManager::new(&config, registered_tx));

    let socket = Arc::new(
        connect_datagram(&config.socket_path)
            .with_context(|| format!("failed to connect to {}", config.socket_path))?,
    );
    let driver_config = DriverConfig {
        min_version: config.min_version,
        ..DriverConfig::default()
    };
    let driver = Driver::new(driver_config, socket.clone(), manager);
    let (handle, mut task) = driver.spawn(socket, 64);

    let io_capability = config.io_capability;
    loop {
        tokio::select! {
            result = &mut task => {
                result.context("driver task panicked")??;
                component_info!(COMPONENT, "Driver stopped");
                return Ok(());
            }

            Some(index) = registered_rx.recv() => {
                let applied = handle
                    .call(move |driver| driver.set_io_capability(index, io_capability))
                    .await;
                match applied {
                    Ok(Ok(())) => component_debug!(
                        COMPONENT,
                        hci = index,
                        "io capability 0x{:02x}",
                        io_capability
                    ),
                    Ok(Err(e)) | Err(e) => {
                        component_warn!(COMPONENT, hci = index, error = %e, "io capability not set")
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                component_info!(COMPONENT, "Shutting down");
                task.abort();
                return Ok(());
            }
        }
    }
}
