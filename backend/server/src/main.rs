//! Khnhom payment service — entry point.
//!
//! Serves the KHQR generation endpoints and the per-transaction SSE status
//! stream; settlement polls against the Bakong gateway are spawned per
//! donation session rather than as one global loop.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use khnhom_payments::bakong::BakongClient;
use khnhom_payments::config::Config;
use khnhom_payments::sessions::PendingDonations;
use khnhom_payments::subscribers::SubscriberRegistry;
use khnhom_payments::{build_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Outbound HTTP client for the Bakong gateway.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let gateway = Arc::new(BakongClient::new(
        client,
        config.bakong_api_url.clone(),
        config.bakong_token.clone(),
    ));

    let state = Arc::new(AppState {
        pool,
        gateway,
        subscribers: SubscriberRegistry::new(),
        sessions: PendingDonations::new(),
        config: config.clone(),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
