//! The Veil seed node.
//!
//! A seed node exists only to spread peers: it accepts connections,
//! answers handshakes and peer exchanges across every network id, and
//! ignores data packets entirely.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use veil_network::Node;
use veil_types::config;

/// The Veil seed node.
#[derive(Parser, Debug)]
#[command(name = "veil-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the database directory
    #[arg(short, long, default_value = ".veil")]
    db_path: PathBuf,

    /// The local port to bind the server to
    #[arg(short, long, default_value_t = config::p2p::DEFAULT_BIND_PORT)]
    port: u16,

    /// Reset the peer database on startup
    #[arg(long)]
    reset: bool,

    /// Additional seed nodes to attempt when bootstrapping, as
    /// host[:port]; repeatable
    #[arg(long = "seed-node")]
    seed_nodes: Vec<String>,

    /// Write log output to this file instead of standard output
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level, 0 (off) through 6 (most verbose)
    #[arg(long, default_value_t = 3)]
    log_level: u8,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level {
        0 => None,
        1 => Some(Level::ERROR),
        2 => Some(Level::WARN),
        3 => Some(Level::INFO),
        4 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };

    let Some(level) = level else {
        return Ok(());
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context("Failed to open log file")?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.init(),
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let database_path = args.db_path.join("peerlist");

    if args.reset && database_path.exists() {
        std::fs::remove_dir_all(&database_path).context("Could not reset peer database")?;
        info!("Reset peer database");
    }

    let node = Node::new(
        &database_path,
        args.port,
        true,
        config::p2p::NETWORK_ID,
    )
    .context("Could not open peer database")?;

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        p2p_version = config::p2p::VERSION,
        minimum_p2p_version = config::p2p::MINIMUM_VERSION,
        peer_id = %node.peer_id(),
        "Starting seed node"
    );

    node.start(&args.seed_nodes)
        .await
        .context("Seed node could not start")?;

    info!(port = node.port(), "P2P seed node started");

    tokio::signal::ctrl_c().await.ok();

    info!(
        incoming = node.incoming_connections(),
        outgoing = node.outgoing_connections(),
        known_peers = node.peers().count().unwrap_or(0),
        "P2P seed node shutting down"
    );

    node.stop();

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = init_logging(&args) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
