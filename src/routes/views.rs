use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::RequireKey;
use crate::db;
use crate::error::AppError;
use crate::models::QueueAction;
use crate::state::SharedState;

/// Pending order work (new orders and ETA refreshes), parked items included.
pub async fn queue(State(state): State<SharedState>, _key: RequireKey) -> Result<Json<Value>, AppError> {
    let items = db::queue::list_excluding_action(&state.pool, QueueAction::RemoveFulfilled).await?;
    tracing::info!("Queue accessed. Size: {}", items.len());
    Ok(Json(json!({ "queue_size": items.len(), "orders": items })))
}

pub async fn queue_fulfilled(
    State(state): State<SharedState>,
    _key: RequireKey,
) -> Result<Json<Value>, AppError> {
    let items = db::queue::list_by_action(&state.pool, QueueAction::RemoveFulfilled).await?;
    tracing::info!("Fulfilled queue accessed. Size: {}", items.len());
    Ok(Json(json!({ "queue_size": items.len(), "orders": items })))
}

pub async fn failed_orders(
    State(state): State<SharedState>,
    _key: RequireKey,
) -> Result<Json<Value>, AppError> {
    let failed = db::queue::list_failed(&state.pool).await?;
    tracing::info!("Failed orders accessed. Count: {}", failed.len());
    Ok(Json(json!({
        "failed_orders_count": failed.len(),
        "failed_orders": failed,
    })))
}

pub async fn status() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn health() -> &'static str {
    "ok"
}
