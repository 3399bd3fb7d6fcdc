//! chunkdrop server entry point.

use std::path::PathBuf;

use chunkdrop_server::{Config, app};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chunkdrop", version, about = "Chunked, resumable upload server")]
struct Args {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, env = "CHUNKDROP_CONFIG", default_value = "chunkdrop.toml")]
    config: PathBuf,

    /// Storage root, overriding `storage.root`.
    #[arg(long, env = "CHUNKDROP_ROOT")]
    root: Option<PathBuf>,

    /// Listen port, overriding `server.port`.
    #[arg(long, env = "CHUNKDROP_PORT")]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CHUNKDROP_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info,chunkdrop=debug")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting chunkdrop");

    let mut config = Config::load(&args.config)?;
    if let Some(root) = args.root {
        config.storage.root = root;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    tracing::info!(
        root = %config.storage.root.display(),
        port = config.server.port,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("shut down cleanly");
    Ok(())
}
