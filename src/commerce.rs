//! Order notes on the commerce platform (Shopify Admin GraphQL).

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::eta::READY;
use crate::reconcile::ItemEta;

const ORDER_NOTE_QUERY: &str = "query($id: ID!) { order(id: $id) { id name note } }";
const ORDER_UPDATE_MUTATION: &str = "mutation orderUpdate($input: OrderInput!) { orderUpdate(input: $input) { order { id note } userErrors { field message } } }";

#[async_trait]
pub trait OrderNotes: Send + Sync {
    /// Append `note` to the order's existing note.
    async fn append_note(&self, profile: &StoreConfig, order_id: &str, note: &str) -> Result<(), String>;
}

/// `Customer Updated DD/MM/YYYY:` followed by one `SKU x qty - eta` line per
/// item. Items ready to ship are shown as reserved.
pub fn compose_note(items: &[ItemEta], today: NaiveDate) -> String {
    let mut note = format!("Customer Updated {}:\n", today.format("%d/%m/%Y"));
    for item in items {
        let eta = if item.eta == READY { "Reserved" } else { item.eta.as_str() };
        note.push_str(&format!("{} x {} - {eta}\n", item.sku, item.quantity));
    }
    note
}

pub struct ShopifyNotes {
    client: reqwest::Client,
}

impl ShopifyNotes {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {e}"))?;
        Ok(Self { client })
    }

    fn endpoint(profile: &StoreConfig) -> String {
        format!(
            "https://{}.myshopify.com/admin/api/{}/graphql.json",
            profile.shop_name, profile.api_version
        )
    }

    async fn graphql(&self, profile: &StoreConfig, body: Value) -> Result<Value, String> {
        let resp = self
            .client
            .post(Self::endpoint(profile))
            .basic_auth(&profile.api_key, Some(&profile.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("GraphQL request failed: {e}"))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid GraphQL response ({status}): {e}"))?;

        if !status.is_success() {
            return Err(format!("GraphQL endpoint returned {status}"));
        }
        if let Some(errors) = body.get("errors") {
            return Err(format!("GraphQL errors: {errors}"));
        }
        Ok(body)
    }
}

#[async_trait]
impl OrderNotes for ShopifyNotes {
    async fn append_note(&self, profile: &StoreConfig, order_id: &str, note: &str) -> Result<(), String> {
        if profile.shop_name.is_empty() {
            return Err("Shop name not configured".into());
        }

        let current = self
            .graphql(profile, json!({ "query": ORDER_NOTE_QUERY, "variables": { "id": order_id } }))
            .await?;
        let order = current
            .pointer("/data/order")
            .filter(|o| !o.is_null())
            .ok_or_else(|| format!("Order {order_id} not found"))?;
        let existing = order.get("note").and_then(Value::as_str).unwrap_or("");

        let combined = format!("{existing}\n\n{note}");
        let updated = self
            .graphql(
                profile,
                json!({
                    "query": ORDER_UPDATE_MUTATION,
                    "variables": { "input": { "id": order_id, "note": combined } }
                }),
            )
            .await?;

        let user_errors = updated
            .pointer("/data/orderUpdate/userErrors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if !user_errors.is_empty() {
            return Err(format!("Note update rejected: {}", Value::Array(user_errors)));
        }

        tracing::info!(
            "Note updated for order {}",
            order.get("name").and_then(serde_json::Value::as_str).unwrap_or(order_id)
        );
        Ok(())
    }
}
