//! `stream-hub-server` binary: parses the command line, sets up logging and signal handling,
//! then hands off to [`stream_hub_server::startup::run`].

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use stream_hub_server::startup::{self, StartupOptions};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("STREAM_HUB_BUILD_INFO"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "stream-hub-server", version = VERSION)]
struct Args {
    /// Server config file (TOML); defaults to ./config.toml or the user config dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding [mpd] bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Listen port, overriding [mpd] port
    #[arg(long)]
    port: Option<u16>,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose {
        "info,stream_hub_server=debug"
    } else {
        "info,stream_hub_server=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    let _ = ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        shutdown_signal.store(true, Ordering::SeqCst);
    });

    startup::run(
        StartupOptions {
            config: args.config,
            bind: args.bind,
            port: args.port,
        },
        shutdown,
    )
}
