//! Pure row planning: what to append for an order, which existing rows to
//! delete or rewrite. Nothing here talks to the sheet.

use std::collections::HashSet;

use crate::models::{LineItem, OrderPayload, OrderRow};

pub const TBC_STATUS: &str = "TBC (No)";
pub const VIN_CHECK: &str = "Please Check VIN";
const HIGH_VALUE_TOTAL: f64 = 500.0;
const ORDER_GID_PREFIX: &str = "gid://shopify/Order/";
const PLACEHOLDER_SKUS: [&str; 2] = ["Tip", "MLP-AIR-FRESHENER"];
const SKU_INDEX: usize = 3;

/// Line items of one vendor, in first-seen order, with their resolved ETAs.
#[derive(Debug)]
pub struct VendorGroup<'a> {
    pub vendor: &'a str,
    pub items: Vec<(&'a LineItem, &'a str)>,
}

pub fn group_by_vendor<'a>(items: &'a [LineItem], etas: &'a [String]) -> Vec<VendorGroup<'a>> {
    let mut groups: Vec<VendorGroup<'a>> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let eta = etas.get(i).map(String::as_str).unwrap_or("");
        let vendor = item.vendor_or_default();
        match groups.iter_mut().find(|g| g.vendor == vendor) {
            Some(group) => group.items.push((item, eta)),
            None => groups.push(VendorGroup {
                vendor,
                items: vec![(item, eta)],
            }),
        }
    }
    groups
}

/// `TBC (No)` for orders over 500 that are still waiting on a VIN.
pub fn status_for(order: &OrderPayload) -> &'static str {
    if order.order_total > HIGH_VALUE_TOTAL && order.has_vin_tag() {
        TBC_STATUS
    } else {
        ""
    }
}

/// Admin link for an order id; ids that are not order GIDs pass through.
pub fn order_url(order_id: &str, admin_url: &str) -> String {
    match order_id.strip_prefix(ORDER_GID_PREFIX) {
        Some(id) => format!("{admin_url}{id}"),
        None => order_id.to_string(),
    }
}

/// `YYYY-MM-DD` in the order's own timezone, or `Invalid Date`.
pub fn created_date(order_created: &str) -> String {
    match crate::eta::parse_order_date(order_created) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// One row per vendor for a new order.
pub fn build_rows(order: &OrderPayload, etas: &[String], admin_url: &str) -> Vec<OrderRow> {
    let created = created_date(&order.order_created);
    let url = order_url(&order.order_id, admin_url);
    let status = status_for(order);
    let backup_note = order.backup_shipping_note.clone().unwrap_or_default();

    group_by_vendor(&order.line_items, etas)
        .into_iter()
        .map(|group| OrderRow {
            created: created.clone(),
            order_number: order.order_number.clone(),
            order_url: url.clone(),
            skus: group.items.iter().map(|(i, _)| i.sku_or_default().to_string()).collect(),
            vendor: group.vendor.to_string(),
            country: order.country().to_string(),
            status: status.to_string(),
            latest_etas: group.items.iter().map(|(_, eta)| eta.to_string()).collect(),
            vin_check: if group.items.iter().any(|(i, _)| i.has_vin()) {
                VIN_CHECK.to_string()
            } else {
                String::new()
            },
            backup_note: backup_note.clone(),
            ..Default::default()
        })
        .collect()
}

/// Data rows (never the header) whose SKU cell is blank or a placeholder.
pub fn placeholder_indices(rows: &[Vec<String>]) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| {
            let sku = row.get(SKU_INDEX).map(|s| s.trim()).unwrap_or("");
            sku.is_empty() || PLACEHOLDER_SKUS.contains(&sku)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Data rows identical to an earlier row; the first occurrence is kept.
pub fn duplicate_indices(rows: &[Vec<String>]) -> Vec<usize> {
    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    let mut duplicates = Vec::new();
    for (i, row) in rows.iter().enumerate().skip(1) {
        let mut key: Vec<&str> = row.iter().map(|c| c.trim()).collect();
        while key.last().is_some_and(|c| c.is_empty()) {
            key.pop();
        }
        if key.is_empty() {
            continue;
        }
        if !seen.insert(key) {
            duplicates.push(i);
        }
    }
    duplicates
}

/// Changes needed to drop fulfilled SKUs from an order's rows.
#[derive(Debug, Default, PartialEq)]
pub struct RemovalPlan {
    /// 0-based indices of rows to delete.
    pub delete: Vec<usize>,
    /// Rows to rewrite in place, by 0-based index.
    pub rewrite: Vec<(usize, OrderRow)>,
}

impl RemovalPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.rewrite.is_empty()
    }
}

/// With no SKUs every row of the order is deleted; otherwise the named SKUs
/// are removed and a row is deleted only once it has none left.
pub fn plan_removal(rows: &[Vec<String>], order_number: &str, skus: &[&str]) -> RemovalPlan {
    let mut plan = RemovalPlan::default();
    for (i, cells) in rows.iter().enumerate().skip(1) {
        let mut row = OrderRow::from_cells(cells);
        if !row.matches_order(order_number) {
            continue;
        }
        if skus.is_empty() {
            plan.delete.push(i);
            continue;
        }
        if !row.remove_skus(skus) {
            continue;
        }
        if row.skus.is_empty() {
            plan.delete.push(i);
        } else {
            plan.rewrite.push((i, row));
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(value: serde_json::Value) -> OrderPayload {
        OrderPayload::from_value(value).unwrap()
    }

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn high_value_orders_waiting_on_vin_are_tbc() {
        let tagged = |total: f64| {
            order(json!({"order_total": total, "tags": "VIN Request Email Sent"}))
        };
        assert_eq!(status_for(&tagged(600.0)), TBC_STATUS);
        assert_eq!(status_for(&tagged(400.0)), "");
        assert_eq!(status_for(&order(json!({"order_total": 900}))), "");
    }

    #[test]
    fn call_for_vin_tag_marks_high_value_orders() {
        let tagged = |total: &str| {
            order(json!({"order_total": total, "tags": "Priority, Call for VIN Alert Sent"}))
        };
        assert_eq!(status_for(&tagged("600")), TBC_STATUS);
        assert_eq!(status_for(&tagged("400")), "");
    }

    #[test]
    fn rows_are_grouped_per_vendor_in_first_seen_order() {
        let order = order(json!({
            "order_number": "#MLP1001",
            "order_id": "gid://shopify/Order/555",
            "order_country": "GB",
            "order_created": "2024-01-01T10:00:00+00:00",
            "backup_shipping_note": "Leave with neighbour",
            "line_items": [
                {"sku": "EVE-1", "vendor": "Eventuri"},
                {"sku": "MST-1", "vendor": "Mishimoto", "vin": "WBA123"},
                {"sku": "EVE-2", "vendor": "Eventuri"},
                {"vendor": null}
            ]
        }));
        let etas: Vec<String> = ["Ready", "05/01/2024", "Awaiting Update", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = build_rows(&order, &etas, "https://admin/orders/");
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].vendor, "Eventuri");
        assert_eq!(rows[0].skus, vec!["EVE-1", "EVE-2"]);
        assert_eq!(rows[0].eta_cell(), "Ready | Awaiting Update");
        assert_eq!(rows[0].created, "2024-01-01");
        assert_eq!(rows[0].order_url, "https://admin/orders/555");
        assert_eq!(rows[0].backup_note, "Leave with neighbour");
        assert!(rows[0].vin_check.is_empty());

        assert_eq!(rows[1].vin_check, VIN_CHECK);
        assert_eq!(rows[2].vendor, "Unknown Vendor");
        assert_eq!(rows[2].skus, vec!["Unknown SKU"]);
    }

    #[test]
    fn invalid_created_date_is_marked() {
        assert_eq!(created_date("not a date"), "Invalid Date");
        assert_eq!(created_date("2024-02-29T23:59:00-08:00"), "2024-02-29");
    }

    #[test]
    fn placeholders_never_include_the_header() {
        let rows = sheet(&[
            &["Date", "Order", "URL", ""],
            &["d", "1", "u", "EVE-1"],
            &["d", "2", "u", "Tip"],
            &["d", "3", "u", ""],
            &["d", "4", "u", "MLP-AIR-FRESHENER"],
            &[],
        ]);
        assert_eq!(placeholder_indices(&rows), vec![2, 3, 4, 5]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let rows = sheet(&[
            &["h"],
            &["d", "1", "u", "A"],
            &["d", "2", "u", "B"],
            &["d", "1", "u", "A", ""],
            &["d", "1", "u", "A"],
        ]);
        assert_eq!(duplicate_indices(&rows), vec![3, 4]);
    }

    #[test]
    fn removal_without_skus_deletes_every_order_row() {
        let rows = sheet(&[
            &["h", "Order"],
            &["d", "#1001", "u", "A"],
            &["d", "1002", "u", "B"],
            &["d", "1001", "u", "C"],
        ]);
        let plan = plan_removal(&rows, "1001", &[]);
        assert_eq!(plan.delete, vec![1, 3]);
        assert!(plan.rewrite.is_empty());
    }

    #[test]
    fn removal_with_skus_rewrites_or_deletes() {
        let rows = sheet(&[
            &["h"],
            &["d", "1001", "u", "A, B", "V1", "", "", "", "", "", "Ready | 15/01/2024"],
            &["d", "1001", "u", "C", "V2"],
            &["d", "1001", "u", "D", "V3"],
        ]);
        let plan = plan_removal(&rows, "#1001", &["A", "C"]);
        assert_eq!(plan.delete, vec![2]);
        assert_eq!(plan.rewrite.len(), 1);
        let (index, row) = &plan.rewrite[0];
        assert_eq!(*index, 1);
        assert_eq!(row.skus, vec!["B"]);
        assert_eq!(row.latest_etas, vec!["15/01/2024"]);
    }

    #[test]
    fn removal_of_unknown_order_is_empty() {
        let rows = sheet(&[&["h"], &["d", "1001", "u", "A"]]);
        assert!(plan_removal(&rows, "9999", &[]).is_empty());
    }
}
