use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tags that mark an order as waiting on a VIN from the customer.
pub const VIN_TAGS: [&str; 2] = ["Call for VIN Alert Sent", "VIN Request Email Sent"];

/// Order data as delivered by the commerce platform's webhook.
///
/// Every field is optional on the wire; numeric fields accept either JSON
/// numbers or numeric strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(default = "unknown_order", deserialize_with = "lenient_string")]
    pub order_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: String,
    #[serde(default)]
    pub order_country: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_created: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub line_items: Vec<LineItem>,
    #[serde(default, deserialize_with = "tag_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub order_total: f64,
    #[serde(default)]
    pub backup_shipping_note: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_first_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "optional_string")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "optional_string")]
    pub vendor: Option<String>,
    #[serde(default, deserialize_with = "optional_string")]
    pub vin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default = "one", deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "optional_string")]
    pub barcode: Option<String>,
    /// Units available at the fulfilling location; `None` when unknown.
    #[serde(default, deserialize_with = "optional_i64")]
    pub inventory: Option<i64>,
}

impl OrderPayload {
    pub fn from_value(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("Invalid order payload: {e}"))
    }

    pub fn has_vin_tag(&self) -> bool {
        self.tags.iter().any(|t| VIN_TAGS.contains(&t.as_str()))
    }

    pub fn country(&self) -> &str {
        self.order_country.as_deref().unwrap_or("Unknown")
    }
}

impl LineItem {
    pub fn sku_or_default(&self) -> &str {
        self.sku.as_deref().unwrap_or("Unknown SKU")
    }

    pub fn vendor_or_default(&self) -> &str {
        self.vendor.as_deref().unwrap_or("Unknown Vendor")
    }

    pub fn has_vin(&self) -> bool {
        self.vin.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

fn unknown_order() -> String {
    "Unknown".to_string()
}

fn one() -> i64 {
    1
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(d)?).unwrap_or_default())
}

fn optional_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(Value::deserialize(d)?))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("order_total out of range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("order_total is not a number: {s}"))),
        other => Err(serde::de::Error::custom(format!(
            "order_total has unexpected type: {other}"
        ))),
    }
}

fn optional_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(optional_i64(d)?.unwrap_or(1))
}

fn nullable_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

/// Tags arrive either as a comma-separated string or as an array of strings.
fn tag_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let tags = match Value::deserialize(d)? {
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numeric_strings_and_tag_strings() {
        let order = OrderPayload::from_value(json!({
            "order_number": 1042,
            "order_total": "612.50",
            "tags": "VIP, Call for VIN Alert Sent ,",
            "line_items": [{"sku": "ABC", "inventory": "-2", "quantity": "3"}]
        }))
        .unwrap();

        assert_eq!(order.order_number, "1042");
        assert_eq!(order.order_total, 612.5);
        assert_eq!(order.tags, vec!["VIP", "Call for VIN Alert Sent"]);
        assert!(order.has_vin_tag());
        assert_eq!(order.line_items[0].inventory, Some(-2));
        assert_eq!(order.line_items[0].quantity, 3);
    }

    #[test]
    fn defaults_for_missing_fields() {
        let order = OrderPayload::from_value(json!({"line_items": null, "tags": ["a", 5]})).unwrap();
        assert_eq!(order.order_number, "Unknown");
        assert!(order.line_items.is_empty());
        assert_eq!(order.tags, vec!["a"]);
        assert_eq!(order.order_total, 0.0);
        assert_eq!(order.country(), "Unknown");
    }

    #[test]
    fn rejects_non_numeric_total() {
        let err = OrderPayload::from_value(json!({"order_total": "lots"})).unwrap_err();
        assert!(err.contains("order_total"));
    }

    #[test]
    fn line_item_defaults() {
        let item: LineItem = serde_json::from_value(json!({"vin": ""})).unwrap();
        assert_eq!(item.sku_or_default(), "Unknown SKU");
        assert_eq!(item.vendor_or_default(), "Unknown Vendor");
        assert!(!item.has_vin());
        assert_eq!(item.quantity, 1);
        assert_eq!(item.inventory, None);
    }
}
