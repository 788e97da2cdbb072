use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use prefixmgr_node::{MemoryFloodingStore, NodeConfig, PrefixManagerNode};

#[derive(Parser)]
#[command(name = "prefixmgr-node", about = "Prefix advertisement control plane")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/prefixmgr/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        prefixmgr_node::logging::init_json(&config.logging.level);
    } else {
        prefixmgr_node::logging::init(&config.logging.level);
    }

    let store = Arc::new(MemoryFloodingStore::new());
    let (mut node, mut routes) = PrefixManagerNode::new(config, Arc::clone(&store));
    let handle = node.shutdown_handle();

    let expiry = store.spawn_expiry(Duration::from_secs(1), handle.subscribe());

    // No decision engine attached: report the routes we would program.
    tokio::spawn(async move {
        while let Some(update) = routes.recv().await {
            for route in &update.upserts {
                tracing::info!(prefix = %route.destination, nexthop = %route.nexthop, "program static route");
            }
            for prefix in &update.deletes {
                tracing::info!(%prefix, "remove static route");
            }
        }
    });

    // Spawn signal handler
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        signal_handle.shutdown();
    });

    if let Err(e) = node.start().await {
        tracing::error!("failed to start prefix manager: {e}");
        std::process::exit(1);
    }

    node.run().await;
    node.shutdown().await;
    let _ = expiry.await;
}
