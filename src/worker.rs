use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::SharedState;

/// Spawn the drain loop. It wakes when a webhook requests a drain, on the
/// configured interval, and stops once shutdown is signaled.
pub fn spawn(state: SharedState, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(run(state, shutdown))
}

async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    if state.processor.is_none() {
        tracing::warn!("Queue worker idle: Google Sheets service not initialized");
    }
    tracing::info!("Queue worker started");

    let mut interval = tokio::time::interval(state.config.queue.drain_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = state.drain().await {
            tracing::error!("Queue drain error: {e}");
        }

        tokio::select! {
            _ = state.drain_signal.notified() => {}
            _ = interval.tick() => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::info!("Queue worker stopped");
}
