use adbridge::actions::{self, RebootMode};
use adbridge::shared::limits;
use adbridge::{Bridge, BridgeConfig, CancellationToken};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "adbridge", version, about = "Query and drive Android devices over adb")]
struct Cli {
    /// Path to the adb executable (overrides ADBRIDGE_ADB_PATH)
    #[arg(long, global = true)]
    adb: Option<PathBuf>,

    /// Directory for captures and pulled artifacts (overrides ADBRIDGE_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached devices with their telemetry
    Devices,
    /// Run a raw adb invocation against one device
    Exec {
        serial: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a shell command on the device
    Shell { serial: String, command: String },
    /// Capture the device log into a file
    Logcat {
        serial: String,
        #[arg(long, default_value_t = limits::DEFAULT_CAPTURE_DURATION.as_secs())]
        seconds: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List installed packages
    Apps { serial: String },
    /// Reboot into normal, bootloader, recovery or sideload mode
    Reboot {
        serial: String,
        #[arg(long, default_value = "normal")]
        mode: String,
    },
    /// Save a screenshot to the output directory
    Screenshot { serial: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::from_env();
    if let Some(adb) = cli.adb {
        config.adb_path = adb;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    let bridge = Bridge::new(config);
    info!("Using adb at {}", bridge.config().adb_path.display());

    match cli.command {
        Command::Devices => {
            let listing = bridge.list_devices().await?;
            for skipped in &listing.skipped {
                warn!("Skipped {}: {}", skipped.serial, skipped.reason);
            }
            print_json(&listing)?;
        }
        Command::Exec { serial, args, timeout } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let result = bridge
                .run_command(&serial, &args, timeout.map(Duration::from_secs))
                .await?;
            print_json(&result)?;
        }
        Command::Shell { serial, command } => {
            let result = actions::execute_shell(bridge.actions(), &serial, &command).await?;
            print_json(&result)?;
        }
        Command::Logcat { serial, seconds, out } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping capture");
                    ctrl_c.cancel();
                }
            });

            let report = bridge
                .capture_stream(&serial, Duration::from_secs(seconds), out.as_deref(), cancel)
                .await?;
            print_json(&report)?;
        }
        Command::Apps { serial } => {
            let apps = actions::list_installed_apps(bridge.actions(), &serial).await?;
            print_json(&apps)?;
        }
        Command::Reboot { serial, mode } => {
            let mode: RebootMode = mode.parse()?;
            actions::reboot(bridge.actions(), &serial, mode).await?;
            info!("Reboot requested for {}", serial);
        }
        Command::Screenshot { serial } => {
            let path = actions::take_screenshot(bridge.actions(), &serial, None).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}
