//! Khnhom payment service library.
//!
//! Exposes the router and application state so the binary and the
//! integration tests share one wiring path.

pub mod api;
pub mod bakong;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod poller;
pub mod qr;
pub mod sessions;
pub mod subscribers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bakong::PaymentGateway;
use config::Config;
use sessions::PendingDonations;
use subscribers::SubscriberRegistry;

pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub subscribers: SubscriberRegistry,
    pub sessions: PendingDonations,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/user/generate-khqr", post(api::generate_khqr))
        .route(
            "/api/user/generate-donation-khqr",
            post(api::generate_donation_khqr),
        )
        .route("/api/payment/events/:md5", get(api::payment_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
