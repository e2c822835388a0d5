//! `keybox` - locker controller.
//!
//! Loads the configuration, sets up logging, wires the devices, the backend
//! transport and the optional command channel into the supervisor and runs
//! it until a restart is requested. The process then exits and the service
//! manager starts it again.

mod logging;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;
use keybox_engine::{
    CodeValidator, CompartmentRegistry, DeviceContext, KeyboxConfig, RemoteSync, Supervisor,
    SystemClock,
};
use keybox_hardware::{LockBank, SoftwareWatchdog};
use keybox_network::{CommandChannel, CommandChannelConfig, HttpTransport, HttpTransportConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Keybox locker controller
#[derive(Parser, Debug)]
#[command(name = "keybox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the device configuration file
    #[arg(short, long, default_value = "keybox.toml")]
    config: PathBuf,

    /// Log filter (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Milliseconds after which a simulated door closes by itself
    #[arg(long, default_value = "4000")]
    simulate_door_close: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = KeyboxConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let sinks = logging::init_logging(&config.logging, cli.log_level.as_deref())?;

    let locks = simulation::lock_bank(
        simulation::rows_for(&config.device),
        Duration::from_millis(cli.simulate_door_close),
    );
    let registry =
        CompartmentRegistry::from_topology(locks.detected_rows(), &config.device.large_compartments)
            .context("invalid compartment topology")?;

    let watchdog = SoftwareWatchdog::start(config.watchdog.timeout())
        .context("failed to start the watchdog")?;
    let ctx = DeviceContext::new(&config, registry, Arc::new(SystemClock), Arc::new(watchdog));

    let transport = HttpTransport::new(HttpTransportConfig {
        base_url: config.backend.url.clone(),
        device_id: config.backend.device_id.clone(),
        api_key: config.backend.api_key.clone(),
        connect_timeout: config.backend.timeout(),
    })
    .context("failed to build the backend client")?;
    let sync = RemoteSync::new(transport, config.backend.timeout()).with_error_queue(sinks.errors);

    let mut supervisor: Supervisor<_, _, _, CommandChannel> = Supervisor::new(
        ctx,
        simulation::stdin_keypad(),
        locks,
        Box::new(simulation::ConsolePanel::default()),
        sync,
        CodeValidator::new(config.access.maintenance_prefix.clone()),
    )
    .with_sensors(simulation::sensors())
    .with_display_log(sinks.display);

    if let Some(broker) = &config.commands.broker {
        supervisor = supervisor.with_commands(CommandChannel::new(CommandChannelConfig {
            broker_addr: broker.clone(),
            timeout: config.commands.poll_timeout(),
        }));
    }

    supervisor.startup().await;

    tokio::select! {
        reason = supervisor.run() => {
            info!(%reason, "Restarting");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
