use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::db;
use crate::models::{NewQueueItem, QueueItem};

#[derive(Debug)]
pub struct ProcessError {
    pub message: String,
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for ProcessError {
    fn from(s: String) -> Self {
        ProcessError { message: s }
    }
}

impl From<&str> for ProcessError {
    fn from(s: &str) -> Self {
        ProcessError {
            message: s.to_string(),
        }
    }
}

/// Applies one queued item. An error leaves the item queued for the next drain.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, item: &QueueItem) -> Result<(), ProcessError>;
}

#[derive(Debug)]
pub enum QueueError {
    Database(sqlx::Error),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Database(e) => write!(f, "Queue storage error: {e}"),
        }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Database(e)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub parked: usize,
}

impl DrainReport {
    pub fn did_work(&self) -> bool {
        self.processed + self.failed + self.dead_lettered > 0
    }
}

/// Durable work queue. Drains are serialized: only one runs at a time.
pub struct OrderQueue {
    pool: SqlitePool,
    config: QueueConfig,
    lock: Mutex<()>,
}

impl OrderQueue {
    pub fn new(pool: SqlitePool, config: QueueConfig) -> Self {
        Self {
            pool,
            config,
            lock: Mutex::new(()),
        }
    }

    pub async fn enqueue(&self, item: &NewQueueItem) -> Result<QueueItem, QueueError> {
        let stored = db::queue::enqueue(&self.pool, item).await?;
        if stored.is_parked() {
            tracing::warn!(
                "Parked queue item {} ({}): {}",
                stored.id,
                stored.action,
                stored.error.as_deref().unwrap_or("")
            );
        } else {
            tracing::debug!("Queued item {} ({} {})", stored.id, stored.action, stored.order_number);
        }
        Ok(stored)
    }

    /// Hold the drain lock, e.g. for sheet writes made outside a drain.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Process every pending item once, in insertion order.
    pub async fn drain(&self, processor: &dyn Processor) -> Result<DrainReport, QueueError> {
        let _guard = self.lock.lock().await;
        let items = db::queue::list(&self.pool).await?;
        let mut report = DrainReport::default();

        for (i, item) in items.iter().enumerate() {
            if item.is_parked() {
                report.parked += 1;
                continue;
            }

            if item.retries >= self.config.max_retries {
                db::queue::move_to_failed(&self.pool, item).await?;
                tracing::error!(
                    "Item {} ({} {}) exceeded {} retries, moved to failed orders",
                    item.id,
                    item.action,
                    item.order_number,
                    self.config.max_retries
                );
                report.dead_lettered += 1;
                continue;
            }

            let attempt = db::queue::record_attempt(&self.pool, item.id).await?;
            tracing::debug!(
                "Processing item {} (action={}, order={}, attempt={attempt})",
                item.id,
                item.action,
                item.order_number
            );

            match processor.process(item).await {
                Ok(()) => {
                    db::queue::delete(&self.pool, item.id).await?;
                    report.processed += 1;
                }
                Err(e) => {
                    tracing::error!("Item {} failed (attempt {attempt}): {e}", item.id);
                    db::queue::record_error(&self.pool, item.id, &e.message).await?;
                    report.failed += 1;
                }
            }

            if i + 1 < items.len() {
                pause(self.config.item_delay).await;
            }
        }

        if report.did_work() {
            tracing::info!(
                "Drain finished: {} processed, {} failed, {} dead-lettered, {} parked",
                report.processed,
                report.failed,
                report.dead_lettered,
                report.parked
            );
            pause(self.config.settle_delay).await;
        }

        Ok(report)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
