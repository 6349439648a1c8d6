pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};

use crate::events::BroadcastEventPublisher;
use crate::handlers::transactions;
use crate::health::HealthService;
use crate::services::TransactionLifecycle;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: TransactionLifecycle,
    /// In-process event feed behind `/ws`.
    pub feed: BroadcastEventPublisher,
    pub health: HealthService,
    /// When set, webhook bodies must carry a valid HMAC signature.
    pub webhook_secret: Option<String>,
}

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/upi-payment",
            post(transactions::initiate_upi_payment),
        )
        .route(
            "/transactions/p2p-transfer",
            post(transactions::initiate_p2p_transfer),
        )
        .route("/transactions/stats", get(transactions::transaction_stats))
        .route("/transactions/:id", get(transactions::get_transaction))
        .route(
            "/transactions/:id/cancel",
            post(transactions::cancel_transaction),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(handlers::ws::ws_handler))
        .route(
            "/webhook/upi-callback",
            post(handlers::webhook::upi_callback),
        )
        .nest("/api/v1", api)
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .with_state(state)
}
