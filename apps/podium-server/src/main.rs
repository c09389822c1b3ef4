use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podium_config::PodiumConfig;
use podium_runtime::build_runtime;

#[derive(Debug, Parser)]
#[command(name = "podium-server")]
struct Args {
    /// Path to the YAML config; built-in defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, overrides the config value
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => podium_config::load_config(path)
            .with_context(|| format!("load config '{}' failed", path.display()))?,
        None => PodiumConfig::default(),
    };

    let listen = match args.listen {
        Some(addr) => addr,
        None => config
            .server
            .listen
            .parse()
            .context("invalid server.listen address")?,
    };

    let runtime = build_runtime(&config).context("build runtime failed")?;
    podium_server::run_server(runtime, listen).await
}
