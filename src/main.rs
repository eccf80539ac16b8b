//! Camera node (v1)
//!
//! Captures frames and posts them to a collector; serves a setup portal on
//! first start.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                   CAMERA NODE                     │
//!                     │                                                   │
//!   Browser (setup)   │  ┌──────────┐   ┌──────────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│   net    │──▶│ http/request │──▶│  portal   │  │
//!                     │  │ listener │   │  (FSM)       │   │ dispatch  │  │
//!                     │  └──────────┘   └──────────────┘   └─────┬─────┘  │
//!                     │                                          ▼        │
//!                     │                                   ┌───────────┐   │
//!                     │                                   │  config   │   │
//!                     │                                   │  store    │   │
//!                     │                                   └─────┬─────┘   │
//!                     │                                         ▼         │
//!   Collector         │  ┌──────────────┐   ┌───────────┐  ┌─────────┐    │
//!   ◀─────────────────┼──│http/transport│◀──│ multipart │◀─│ upload  │    │
//!   ─────────────────▶┼─▶│ + response   │   │ envelope  │  │ capture │    │
//!                     │  └──────────────┘   └───────────┘  └─────────┘    │
//!                     │                                                   │
//!                     │  lifecycle (startup / shutdown) · observability   │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use camera_node::config::{load_config, FileConfigStore, NodeConfig};
use camera_node::lifecycle::{load_device_config, run_node, run_portal, signals, Shutdown};
use camera_node::observability::{logging, metrics};
use camera_node::upload::{register_module, FileFrameSource, Registration, Uploader};

#[derive(Parser)]
#[command(name = "camera-node")]
#[command(about = "Camera node: capture and upload frames, first-time setup portal", long_about = None)]
struct Cli {
    /// Node settings (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the setup portal until a configuration is saved
    Portal,
    /// Capture and upload a single frame
    Upload {
        /// JPEG to send instead of the configured capture source
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Upload URL instead of the stored one
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Announce this module to the collector
    Register,
    /// Portal if unconfigured, then register and upload on the interval (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("camera-node v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_ctrl_c_handler(shutdown.clone());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_node(&config, &shutdown).await?,
        Commands::Portal => {
            let store = FileConfigStore::from_settings(&config.device);
            let mut signal = shutdown.subscribe();
            if run_portal(&config, store, &mut signal).await?.is_none() {
                tracing::info!("Portal stopped before a configuration was saved");
            }
        }
        Commands::Upload { image, url } => {
            let device = load_device_config(&FileConfigStore::from_settings(&config.device))?;
            let url = url.unwrap_or(device.upload_url);
            let mut source = FileFrameSource::new(image.unwrap_or_else(|| PathBuf::from(&config.capture.image_path)));
            let mut uploader = Uploader::from_config(&config);
            match uploader.post_image(&mut source, &url).await {
                Ok(receipt) => println!("{}", receipt.status),
                Err(e) => {
                    eprintln!("upload failed ({}): {}", e.code(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Register => {
            let device = load_device_config(&FileConfigStore::from_settings(&config.device))?;
            let registration = Registration::new(&config.device, &device);
            let status = register_module(&reqwest::Client::new(), &device.init_url, &registration).await?;
            println!("{}", status);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
