pub mod gmail;
pub mod views;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/webhook", post(webhook::receive))
        .route("/gmail-eta-update", post(gmail::eta_update))
        .route("/queue", get(views::queue))
        .route("/queue_fulfilled", get(views::queue_fulfilled))
        .route("/failed_orders", get(views::failed_orders))
}

pub fn health_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(views::status))
        .route("/health", get(views::health))
}
