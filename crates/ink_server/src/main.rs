//! The `webink` binary: load config, wire everything up, serve forever.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

use ink_types::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "webink", about = "Web page snapshot server for e-ink devices")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the config's data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the config's HTTP port.
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the config's TCP tile-protocol port.
    #[arg(long)]
    tcp_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ink_log::setup_logging();

    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(tcp_port) = args.tcp_port {
        config.tcp_port = tcp_port;
    }

    ink_log::info!(
        "loaded config: {} pages, {} devices, {} modes",
        config.pages.len(),
        config.devices.len(),
        config.supported_modes.len(),
    );

    ink_server::run(config).await
}
