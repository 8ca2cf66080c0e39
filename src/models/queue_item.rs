use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Store;

/// What a queued webhook asks the reconciler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    /// Append the order's rows (with the backup shipping note, if any).
    NewOrder,
    /// Remove fulfilled SKUs, or the whole order when no items are named.
    RemoveFulfilled,
    /// Re-resolve ETAs against fresh inventory and notify on changes.
    RefreshEta,
}

impl QueueAction {
    /// Map the webhook `action` query parameter to a queue action.
    pub fn from_webhook(action: &str) -> Option<Self> {
        match action {
            "addNewOrders" | "addBackupShippingNote" => Some(QueueAction::NewOrder),
            "removeFulfilledSKU" => Some(QueueAction::RemoveFulfilled),
            "checkEtaUpdates" => Some(QueueAction::RefreshEta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::NewOrder => "new_order",
            QueueAction::RemoveFulfilled => "remove_fulfilled",
            QueueAction::RefreshEta => "refresh_eta",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_order" => Some(QueueAction::NewOrder),
            "remove_fulfilled" => Some(QueueAction::RemoveFulfilled),
            "refresh_eta" => Some(QueueAction::RefreshEta),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub action: String,
    pub store: String,
    pub order_number: String,
    pub payload: Option<serde_json::Value>,
    /// Set for payloads that could not be classified; such items stay parked.
    pub error: Option<String>,
    pub raw_data: Option<String>,
    pub retries: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn is_parked(&self) -> bool {
        self.error.is_some()
    }
}

/// Dead-letter record for an item that used up its retry budget.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct FailedOrder {
    pub id: i64,
    pub queue_item_id: i64,
    pub action: String,
    pub store: String,
    pub order_number: String,
    pub payload: Option<serde_json::Value>,
    pub retries: i64,
    pub last_error: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub action: QueueAction,
    pub store: Store,
    pub order_number: String,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub raw_data: Option<String>,
}

impl NewQueueItem {
    pub fn order(action: QueueAction, store: Store, order_number: &str, payload: serde_json::Value) -> Self {
        Self {
            action,
            store,
            order_number: order_number.to_string(),
            payload: Some(payload),
            error: None,
            raw_data: None,
        }
    }

    /// An unprocessable payload, kept for manual inspection.
    pub fn parked(action: QueueAction, store: Store, order_number: &str, error: String, raw_data: String) -> Self {
        Self {
            action,
            store,
            order_number: order_number.to_string(),
            payload: None,
            error: Some(error),
            raw_data: Some(raw_data),
        }
    }
}
