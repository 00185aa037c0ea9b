//! vizor host — entry point.
//!
//! ```text
//! vizor-host                  Run the capture service (foreground)
//! vizor-host --config <path>  Load a custom config TOML
//! vizor-host --gen-config     Write default config to stdout
//! ```
//!
//! The host runs the update pipeline and acts as its consumer: every
//! published update is drained, accounted, and acknowledged. Shipping
//! packets to a remote viewer belongs to a transport layer on top.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vizor_core::desktop::updater::ScreenUpdater;

mod config;
use config::HostConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vizor-host", about = "vizor screen-capture host service")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vizor-host.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = HostConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vizor-host v{}", env!("CARGO_PKG_VERSION"));
    info!("update interval: {} ms", config.screen.update_interval_ms);
    info!("video encoding: {}", config.screen.video_encoding);
    info!("cursor shape: {}", config.screen.cursor_shape);

    // An unsupported encoding fails here, before the pipeline starts.
    let updater_config = config.to_updater_config()?;
    let mut updater = ScreenUpdater::start(updater_config)?;

    // Ctrl-C handler.
    let cancel = updater.cancellation_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("ctrl-c received; shutting down");
        cancel.cancel();
    });

    // Consumer loop: drain, account, acknowledge.
    let mut updates: u64 = 0;
    let mut bytes: u64 = 0;
    let mut last_report = Instant::now();

    while let Some(event) = updater.next_update().await {
        updates += 1;
        if let Some(packet) = &event.video_packet {
            bytes += packet.data.len() as u64;
            debug!(
                "video packet #{}: {} rects, {} bytes",
                packet.frame_number,
                packet.rect_count,
                packet.data.len()
            );
        }
        if let Some(shape) = &event.cursor_shape {
            bytes += shape.data.len() as u64;
            debug!(
                "cursor shape {}x{} ({} bytes)",
                shape.width,
                shape.height,
                shape.data.len()
            );
        }

        updater.acknowledge();

        if last_report.elapsed() >= Duration::from_secs(5) {
            info!("published {updates} updates, {bytes} encoded bytes");
            last_report = Instant::now();
        }
    }

    info!("update stream ended: {updates} updates, {bytes} encoded bytes");
    Ok(())
}
