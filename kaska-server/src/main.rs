//! Kaska broker server binary.
//!
//! Hosts the broker state machine behind the framed TCP protocol:
//!
//! ```bash
//! kaska-server --port 4800 --root-dir /var/lib/kaska
//! ```
//!
//! The root directory holds all broker state: `data/` with one log file per
//! topic and `commits/` with one offset file per (client, topic). Both are
//! created on first start; an existing root is recovered before the
//! listener comes up.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kaska_broker::Broker;
use kaska_commits::FsCommitStore;
use kaska_log::{TokioStorage, TopicLogStore};
use kaska_rpc::RpcServer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Kaska publish/subscribe broker.
#[derive(Parser, Debug)]
#[command(name = "kaska-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for client connections.
    #[arg(long, default_value = "4800")]
    port: u16,

    /// Root directory for broker state (`data/` and `commits/` live here).
    #[arg(long)]
    root_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Log to stderr so stdout stays free for the hosting environment.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        port = args.port,
        root_dir = %args.root_dir.display(),
        "starting kaska broker"
    );

    let logs = TopicLogStore::open(TokioStorage::new(), args.root_dir.join("data")).await?;
    let commits = FsCommitStore::open(args.root_dir.join("commits")).await?;
    let broker = Arc::new(Broker::recover(logs, commits).await);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let server = RpcServer::bind(addr).await?;
    info!(%addr, "kaska broker listening");

    server.serve(broker).await?;
    Ok(())
}
