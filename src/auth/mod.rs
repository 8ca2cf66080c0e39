use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

#[derive(Deserialize)]
struct KeyParam {
    key: Option<String>,
}

/// Guard for routes that require the shared secret in the `key` query parameter.
#[derive(Debug, Clone, Copy)]
pub struct RequireKey;

impl FromRequestParts<SharedState> for RequireKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let provided = Query::<KeyParam>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|q| q.0.key)
            .unwrap_or_default();

        if key_matches(&provided, &state.config.secret_key) {
            Ok(RequireKey)
        } else {
            tracing::warn!("Rejected request to {} with invalid key", parts.uri.path());
            Err(AppError::Forbidden("Access Denied".to_string()))
        }
    }
}

fn key_matches(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}
