use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::RequireKey;
use crate::error::AppError;
use crate::mailbox;
use crate::state::SharedState;

/// Scan the mailbox for supplier ETA mentions and record them on the order sheets.
pub async fn eta_update(State(state): State<SharedState>, _key: RequireKey) -> Result<Json<Value>, AppError> {
    let reconciler = state
        .reconciler
        .as_ref()
        .ok_or_else(|| AppError::NotInitialized("Google Sheets service not initialized".to_string()))?;
    let mailbox = state
        .mailbox
        .as_ref()
        .ok_or_else(|| AppError::NotInitialized("Gmail service not initialized".to_string()))?;

    tracing::info!("Triggered Gmail ETA update check");

    let updates = {
        let _guard = state.queue.exclusive().await;
        mailbox::sync_mentions(mailbox.as_ref(), reconciler)
            .await
            .map_err(AppError::Internal)?
    };

    let recorded = updates.iter().filter(|u| u.recorded).count();
    tracing::info!("Gmail check found {} update(s), {recorded} recorded", updates.len());

    Ok(Json(json!({
        "status": "success",
        "message": format!("Checked Gmail. Found {} updates.", updates.len()),
        "updates": updates,
    })))
}
