use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{FailedOrder, NewQueueItem, QueueAction, QueueItem};

pub async fn enqueue(pool: &SqlitePool, item: &NewQueueItem) -> Result<QueueItem, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "INSERT INTO queue_items (action, store, order_number, payload, error, raw_data, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(item.action.as_str())
    .bind(item.store.code())
    .bind(&item.order_number)
    .bind(&item.payload)
    .bind(&item.error)
    .bind(&item.raw_data)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

/// All queued items in insertion order, parked ones included.
pub async fn list(pool: &SqlitePool) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>("SELECT * FROM queue_items ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

/// Everything except `action`, e.g. all order work other than fulfilment removals.
pub async fn list_excluding_action(
    pool: &SqlitePool,
    action: QueueAction,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>("SELECT * FROM queue_items WHERE action != ? ORDER BY id ASC")
        .bind(action.as_str())
        .fetch_all(pool)
        .await
}

pub async fn list_by_action(
    pool: &SqlitePool,
    action: QueueAction,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>("SELECT * FROM queue_items WHERE action = ? ORDER BY id ASC")
        .bind(action.as_str())
        .fetch_all(pool)
        .await
}

/// Count an attempt against the item's retry budget before it is processed.
pub async fn record_attempt(pool: &SqlitePool, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE queue_items SET retries = retries + 1 WHERE id = ? RETURNING retries",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn record_error(pool: &SqlitePool, id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE queue_items SET last_error = ? WHERE id = ?")
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM queue_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move an item to the dead-letter log and drop it from the queue in one transaction.
pub async fn move_to_failed(pool: &SqlitePool, item: &QueueItem) -> Result<FailedOrder, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let failed = sqlx::query_as::<_, FailedOrder>(
        "INSERT INTO failed_orders
            (queue_item_id, action, store, order_number, payload, retries, last_error, failed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(item.id)
    .bind(&item.action)
    .bind(&item.store)
    .bind(&item.order_number)
    .bind(&item.payload)
    .bind(item.retries)
    .bind(&item.last_error)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM queue_items WHERE id = ?")
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(failed)
}

pub async fn list_failed(pool: &SqlitePool) -> Result<Vec<FailedOrder>, sqlx::Error> {
    sqlx::query_as::<_, FailedOrder>("SELECT * FROM failed_orders ORDER BY id ASC")
        .fetch_all(pool)
        .await
}
