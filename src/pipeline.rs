use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{OrderPayload, QueueAction, QueueItem, Store};
use crate::notify::Notifier;
use crate::queue::{ProcessError, Processor};
use crate::reconcile::{ApplyOutcome, Reconciler};

/// Runs queued webhook actions against the order sheets.
pub struct OrderProcessor {
    reconciler: Arc<Reconciler>,
    notifier: Option<Arc<Notifier>>,
}

impl OrderProcessor {
    pub fn new(reconciler: Arc<Reconciler>, notifier: Option<Arc<Notifier>>) -> Self {
        Self {
            reconciler,
            notifier,
        }
    }
}

#[async_trait]
impl Processor for OrderProcessor {
    async fn process(&self, item: &QueueItem) -> Result<(), ProcessError> {
        let action = QueueAction::parse(&item.action)
            .ok_or_else(|| format!("Unknown queue action: {}", item.action))?;
        let store =
            Store::parse(&item.store).ok_or_else(|| format!("Unknown store: {}", item.store))?;
        let payload = item.payload.clone().ok_or("Queue item has no payload")?;
        let order = OrderPayload::from_value(payload)?;

        match action {
            QueueAction::NewOrder => {
                let outcome = self
                    .reconciler
                    .apply_order(store, &order)
                    .await
                    .map_err(|e| e.to_string())?;
                if let ApplyOutcome::Applied { items, .. } = outcome {
                    if let Some(notifier) = &self.notifier {
                        notifier.order_received(store, &order, &items).await;
                    }
                }
            }
            QueueAction::RemoveFulfilled => {
                self.reconciler
                    .remove_fulfilled(store, &order)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            QueueAction::RefreshEta => {
                let refresh = self
                    .reconciler
                    .refresh_etas(store, &order)
                    .await
                    .map_err(|e| e.to_string())?;
                if !refresh.changes.is_empty() {
                    if let Some(notifier) = &self.notifier {
                        notifier.eta_changed(store, &order, &refresh.items).await;
                    }
                }
            }
        }

        Ok(())
    }
}
