//! PriceFeed service
//!
//! Sets up the feed against the configured on-chain sources, journals its
//! notifications and serves a price every poll interval until Ctrl-C.

use anyhow::{Context, Result};
use ethers::providers::{Http, Provider};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pricefeed::config::{AppConfig, LoggingConfig};
use pricefeed::oracle::sources::{BandReferenceClient, ChainlinkAggregatorClient};
use pricefeed::oracle::PriceFeed;
use pricefeed::persistence::FeedJournal;
use pricefeed::types::FeedEvent;

fn init_logging(cfg: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        config = %config,
        "Starting pricefeed"
    );

    let provider = Provider::<Http>::try_from(config.sources.rpc_url.clone())
        .with_context(|| format!("Invalid rpc_url '{}'", config.sources.rpc_url))?;
    let provider = Arc::new(provider);

    let primary = Arc::new(ChainlinkAggregatorClient::new(
        provider.clone(),
        config.sources.primary_address()?,
        config.sources.call_timeout(),
    ));
    let secondary = Arc::new(BandReferenceClient::new(
        provider,
        config.sources.secondary_address()?,
        config.sources.call_timeout(),
    ));

    let feed = PriceFeed::setup(primary, secondary, config.feed_settings()?)
        .await
        .context("Price feed setup failed")?;
    let feed = Arc::new(feed);

    if config.persistence.journal_enabled {
        let journal = FeedJournal::new(&config.persistence.data_dir)?;
        let mut events = BroadcastStream::new(feed.subscribe());

        // Setup's initial price went out before anyone could subscribe
        let initial = FeedEvent::PriceUpdated {
            price: feed.last_good_price().await,
        };
        journal.record(&initial).await?;

        tokio::spawn(async move {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        if let Err(e) = journal.record(&event).await {
                            warn!(error = %e, "Failed to journal feed event");
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Journal fell behind feed events");
                    }
                }
            }
        });
    }

    #[cfg(feature = "dashboard")]
    {
        let feed = feed.clone();
        let bind = config.dashboard.bind.clone();
        tokio::spawn(async move {
            if let Err(e) = pricefeed::dashboard::serve(feed, &bind).await {
                tracing::error!(error = %e, "Dashboard stopped");
            }
        });
    }

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.oracle.poll_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let price = feed.fetch_price().await;
                let state = feed.status().await;
                info!(price = %price, state = %state, "Price served");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
