use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use terawatch::{web, AppConfig, ChromeRenderer, ItemStore};

/// Backend for the terawatch application: scrapes storage listings, ranks
/// them by price per terabyte and streams the ranking to connected viewers.
#[derive(Parser, Debug)]
#[command(name = "terawatch", version)]
struct Args {
    /// Tracing level for this crate (trace, debug, info, warn, error)
    #[arg(long, default_value = "debug")]
    verbosity: String,

    /// Seconds between product listing refreshes
    #[arg(long)]
    period: Option<u64>,

    /// Number of search result pages to scan per refresh
    #[arg(long)]
    pages: Option<u32>,

    /// Listen address as host:port
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("terawatch={}", args.verbosity).parse()?),
        )
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(period) = args.period {
        config.refresh.period_secs = period;
    }
    if let Some(pages) = args.pages {
        config.refresh.pages = pages;
    }
    if let Some(addr) = &args.addr {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("--addr must be host:port, got {addr:?}"))?;
        config.server.host = host.to_string();
        config.server.port = port.parse()?;
    }
    config.validate()?;

    info!("Starting terawatch...");

    // A renderer that cannot launch is the one fatal startup error
    let renderer = ChromeRenderer::launch(&config.renderer)?;

    let store = Arc::new(ItemStore::new());
    store
        .start(
            Box::new(renderer),
            Duration::from_secs(config.refresh.period_secs),
            config.refresh.pages,
        )
        .await?;

    web::serve(&config.server, Arc::clone(&store)).await?;

    info!("Shutting down...");
    store.stop().await;

    Ok(())
}
