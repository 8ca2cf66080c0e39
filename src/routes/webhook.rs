use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::RequireKey;
use crate::error::AppError;
use crate::models::{NewQueueItem, OrderPayload, QueueAction, Store};
use crate::payload::{clean_json, is_empty_json};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct WebhookParams {
    #[serde(default)]
    pub action: String,
    pub store: Option<String>,
}

/// Queue a webhook for the drain worker. Anything that cannot be classified
/// is still accepted, but parked with the reason and the raw body.
pub async fn receive(
    State(state): State<SharedState>,
    _key: RequireKey,
    Query(params): Query<WebhookParams>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if state.processor.is_none() {
        return Err(AppError::NotInitialized(
            "Google Sheets service not initialized".to_string(),
        ));
    }
    let action = QueueAction::from_webhook(&params.action);
    let (body, lossy) = match String::from_utf8(body.to_vec()) {
        Ok(text) => (text, false),
        Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
    };
    tracing::debug!("Webhook {} body: {body}", params.action);

    let cleaned = clean_json(&body);
    let item = match serde_json::from_str::<Value>(&cleaned) {
        _ if lossy => parked(
            &state,
            &params,
            action,
            "Unknown",
            "Invalid JSON: body is not valid UTF-8".to_string(),
            body,
        ),
        Err(e) => {
            tracing::error!("Failed to parse webhook JSON: {e}");
            parked(&state, &params, action, "Unknown", format!("Invalid JSON: {e}"), body)
        }
        Ok(value) if is_empty_json(&value) => parked(
            &state,
            &params,
            action,
            "Unknown",
            "No valid JSON data after cleaning".to_string(),
            body,
        ),
        Ok(value) => {
            let order_number = value
                .get("order_number")
                .map(|n| match n {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "Unknown".to_string());

            match (action, OrderPayload::from_value(value.clone())) {
                (None, _) => parked(
                    &state,
                    &params,
                    None,
                    &order_number,
                    format!("Invalid action: {}", params.action),
                    body,
                ),
                (Some(action), Err(e)) => {
                    parked(&state, &params, Some(action), &order_number, e, body)
                }
                (Some(action), Ok(order)) => {
                    let store = resolve_store(&state, &params, order.store.as_deref());
                    NewQueueItem::order(action, store, &order.order_number, value)
                }
            }
        }
    };

    let stored = state.queue.enqueue(&item).await?;

    let message = match &stored.error {
        Some(error) => format!("Order {} queued with error: {error}", stored.order_number),
        None => {
            state.request_drain();
            format!("Order {} added to queue", stored.order_number)
        }
    };

    Ok(Json(json!({
        "status": "queued",
        "message": message,
        "id": stored.id,
        "action": stored.action,
        "store": stored.store,
        "parked": stored.error.is_some(),
    })))
}

fn parked(
    state: &SharedState,
    params: &WebhookParams,
    action: Option<QueueAction>,
    order_number: &str,
    error: String,
    raw: String,
) -> NewQueueItem {
    let store = resolve_store(state, params, None);
    NewQueueItem::parked(
        action.unwrap_or(QueueAction::NewOrder),
        store,
        order_number,
        error,
        raw,
    )
}

/// `store` query parameter, then the payload's store, then the configured default.
fn resolve_store(state: &SharedState, params: &WebhookParams, payload_store: Option<&str>) -> Store {
    params
        .store
        .as_deref()
        .and_then(Store::parse)
        .or_else(|| payload_store.and_then(Store::parse))
        .unwrap_or(state.config.default_store)
}
