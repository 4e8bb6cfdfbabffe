//! geoproxy - Redis-protocol proxy with geo-spatial commands
//!
//! Entry point: parses configuration, builds the backend and optional geo
//! index, and accepts client connections until Ctrl+C.

use clap::Parser;
use geoproxy::commands::CommandContext;
use geoproxy::connection::{handle_connection, ConnectionStats};
use geoproxy::geo::GeoIndex;
use geoproxy::session::SessionRegistry;
use geoproxy::storage::{start_expiry_sweeper, Expiring, StorageEngine};
use geoproxy::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
geoproxy v{} - Redis-protocol proxy
──────────────────────────────────────────────────────────────
Listening on {}
Geo extension: {}
Backend timeout: {} ms, retries: {}

Use Ctrl+C to shutdown gracefully.
"#,
        geoproxy::VERSION,
        config.bind_address(),
        if config.geo { "enabled" } else { "disabled" },
        config.timeout_ms,
        config.max_retry_times,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let options = config.proxy_options()?;

    print_banner(&config);

    // Backend (shared across all sessions)
    let storage = Arc::new(StorageEngine::new());
    let mut expiring = vec![storage.clone() as Arc<dyn Expiring>];
    info!("Storage engine initialized with 64 shards");

    let mut ctx = CommandContext::new(storage.clone(), options);
    if config.geo {
        let extractor = config.extractor()?;
        info!(
            separator = %config.geo_separator,
            lat_index = extractor.lat_index,
            lng_index = extractor.lng_index,
            "Geo extension enabled"
        );
        let index = Arc::new(GeoIndex::new(storage, extractor));
        expiring.push(index.clone());
        ctx = ctx.with_geo(index);
    }
    let _sweeper = start_expiry_sweeper(expiring);

    let registry = Arc::new(SessionRegistry::new(Arc::new(ctx)));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    tokio::select! {
        _ = accept_loop(listener, registry, stats) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received, stopping proxy..."),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("Proxy shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = Arc::clone(&registry);
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, registry, stats));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
