//! meshwatch daemon entry point.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::signal;

mod config;
mod credits;
mod discovery;
mod http_server;
mod merge;
mod scoring;
mod sources;
mod types;

use config::Config;
use discovery::{DiscoveryCache, MeshDiscovery};
use http_server::{bind_http, run_http_server};
use sources::{CreditSource, HttpCreditClient, HttpSeedClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting meshwatch with config: {:?}", cfg);

    // Upstreams
    let seed_client = HttpSeedClient::new(cfg.seed_rpc_port, cfg.seed_timeout())?;
    let credit_source: Option<Arc<dyn CreditSource>> = match &cfg.credits_url {
        Some(url) => Some(Arc::new(HttpCreditClient::new(
            url.clone(),
            cfg.credits_timeout(),
        )?)),
        None => {
            info!("No credits_url configured; all credits will be 0");
            None
        }
    };

    let discovery = MeshDiscovery::new(
        cfg.seeds.clone(),
        Arc::new(seed_client),
        credit_source,
        cfg.seed_timeout(),
        cfg.credits_timeout(),
    );
    let cache = Arc::new(DiscoveryCache::new(discovery, cfg.cache_ttl()));
    info!(
        "Discovering via {} seeds, cache TTL {:?}",
        cfg.seeds.len(),
        cache.ttl()
    );
    for seed in &cfg.seeds {
        debug!("Seed endpoint: {}", cfg.seed_rpc_url(seed));
    }

    // Bind before spawning anything so a taken port fails startup.
    let listener = bind_http(cfg.http_bind).await?;

    // Pre-warm so the first caller does not pay for a full cycle.
    let cache_for_warmup = Arc::clone(&cache);
    let warmup_handle = tokio::spawn(async move {
        let snapshot = cache_for_warmup.prewarm().await;
        info!("Pre-warm complete: {} nodes", snapshot.nodes.len());
    });

    // HTTP API
    let cache_for_http = Arc::clone(&cache);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = run_http_server(listener, cache_for_http).await {
            error!("HTTP server failed: {}", e);
        }
    });

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    warmup_handle.abort();
    http_handle.abort();

    if let Some(snapshot) = cache.peek().await {
        info!(
            "Last snapshot: {} nodes captured at {}",
            snapshot.nodes.len(),
            snapshot.captured_at
        );
    }

    info!("Shutdown complete.");
    Ok(())
}
