use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use omnilog_server::{IngestRouter, RecordHub, ServerConfig, UdpReceiver};
use omnilog_store::LogStore;

/// Omnilog - universal syslog sink and log viewer backend
#[derive(Parser, Debug)]
#[command(name = "omnilog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(long, default_value = "omnilog.toml")]
    config: PathBuf,

    /// Bind address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// UDP port for receiving syslog/raw messages (overrides the config file)
    #[arg(long)]
    udp_port: Option<u16>,

    /// SQLite database file path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.udp_port {
        config.udp_port = port;
    }
    if let Some(db) = args.db {
        config.db_path = db;
    }

    run(config).await
}

async fn run(config: ServerConfig) -> Result<()> {
    let store = Arc::new(LogStore::open(&config.db_path)?);
    let hub = Arc::new(RecordHub::new());
    let router = Arc::new(IngestRouter::new(Arc::clone(&store), Arc::clone(&hub)));

    let receiver = UdpReceiver::bind(&config.udp_addr()).await?;
    let local = receiver.local_addr()?;
    tracing::info!(
        addr = %local,
        db = %config.db_path.display(),
        "omnilog started; send syslog or raw UDP messages to this address"
    );

    let cancel = CancellationToken::new();
    let receive_loop = tokio::spawn(receiver.run(Arc::clone(&router), cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    // Stop accepting datagrams; in-flight work drains before the loop exits
    cancel.cancel();
    receive_loop.await?;
    tracing::info!(processed = router.processed(), "shutdown complete");
    Ok(())
}
