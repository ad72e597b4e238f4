//! Main entry point for the arcbrowse server.
//!
//! Parses configuration, initializes logging and serves until ctrl-c.

use anyhow::Result;
use clap::Parser;

use arcbrowse::{Cli, Server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(
        "Configuration: root={:?} addr={} max_open_archives={}",
        cli.root,
        cli.socket_addr(),
        cli.max_open_archives
    );

    let server = Server::new(&cli)?;
    server.run().await
}
