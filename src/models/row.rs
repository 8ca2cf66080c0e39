/// Column letters used when addressing single columns of the order sheet.
pub mod column {
    pub const ORDER_NUMBER: char = 'B';
    pub const SKU: char = 'D';
    pub const ASSIGN_TYPE: char = 'G';
    pub const PIC: char = 'I';
    pub const LATEST_ETA: char = 'K';
}

const SKU_SEPARATOR: &str = ", ";
const ETA_SEPARATOR: &str = " | ";

/// One row of the order sheet. Rows are grouped per vendor, so a row holds
/// every SKU of one vendor within one order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRow {
    /// A: order date, `YYYY-MM-DD`.
    pub created: String,
    /// B: order number, the dedupe key.
    pub order_number: String,
    /// C: link to the order in the commerce admin.
    pub order_url: String,
    /// D: SKUs of this vendor.
    pub skus: Vec<String>,
    /// E
    pub vendor: String,
    /// F
    pub country: String,
    /// G: formula cell.
    pub assign_type: String,
    /// H: formula cell.
    pub supplier: String,
    /// I: formula cell.
    pub pic: String,
    /// J: `TBC (No)` for high-value orders still waiting on a VIN.
    pub status: String,
    /// K: latest ETA per SKU, aligned with `skus`.
    pub latest_etas: Vec<String>,
    /// L
    pub vin_check: String,
    /// M
    pub backup_note: String,
    /// N
    pub notes: String,
}

impl OrderRow {
    /// Build a row from positional cells as returned by the sheet. Missing
    /// trailing cells are treated as empty.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        OrderRow {
            created: cell(0),
            order_number: cell(1),
            order_url: cell(2),
            skus: split_list(&cell(3)),
            vendor: cell(4),
            country: cell(5),
            assign_type: cell(6),
            supplier: cell(7),
            pic: cell(8),
            status: cell(9),
            latest_etas: split_etas(&cell(10)),
            vin_check: cell(11),
            backup_note: cell(12),
            notes: cell(13),
        }
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.created.clone(),
            self.order_number.clone(),
            self.order_url.clone(),
            self.sku_cell(),
            self.vendor.clone(),
            self.country.clone(),
            self.assign_type.clone(),
            self.supplier.clone(),
            self.pic.clone(),
            self.status.clone(),
            self.eta_cell(),
            self.vin_check.clone(),
            self.backup_note.clone(),
            self.notes.clone(),
        ]
    }

    pub fn sku_cell(&self) -> String {
        self.skus.join(SKU_SEPARATOR)
    }

    pub fn eta_cell(&self) -> String {
        if self.latest_etas.iter().all(|e| e.is_empty()) {
            return String::new();
        }
        self.latest_etas.join(ETA_SEPARATOR)
    }

    /// Compares order numbers with any leading `#` stripped from both sides.
    pub fn matches_order(&self, order_number: &str) -> bool {
        self.order_number.trim_start_matches('#') == order_number.trim_start_matches('#')
    }

    /// ETA recorded for the SKU at `index`, if the ETA column lines up with the SKUs.
    pub fn eta_at(&self, index: usize) -> Option<&str> {
        if self.latest_etas.len() != self.skus.len() {
            return None;
        }
        self.latest_etas.get(index).map(String::as_str)
    }

    /// Set the ETA of the SKU at `index`, padding the ETA list to the SKU list.
    pub fn set_eta(&mut self, index: usize, eta: &str) {
        if self.latest_etas.len() != self.skus.len() {
            self.latest_etas.resize(self.skus.len(), String::new());
        }
        if let Some(slot) = self.latest_etas.get_mut(index) {
            *slot = eta.to_string();
        }
    }

    /// Remove the given SKUs (and their ETAs) from this row. Returns true if
    /// any SKU was removed.
    pub fn remove_skus(&mut self, skus: &[&str]) -> bool {
        let aligned = self.latest_etas.len() == self.skus.len();
        let mut removed = false;

        for sku in skus {
            if let Some(pos) = self.skus.iter().position(|s| s == sku) {
                self.skus.remove(pos);
                if aligned {
                    self.latest_etas.remove(pos);
                }
                removed = true;
            }
        }

        removed
    }
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Empty entries are kept so positions stay aligned with the SKU list.
fn split_etas(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return Vec::new();
    }
    cell.split('|').map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn short_rows_fill_with_empty_cells() {
        let row = OrderRow::from_cells(&cells(&["2024-01-01", "#1001", "url", "A1, B2"]));
        assert_eq!(row.order_number, "#1001");
        assert_eq!(row.skus, vec!["A1", "B2"]);
        assert!(row.vendor.is_empty());
        assert_eq!(row.to_cells().len(), 14);
    }

    #[test]
    fn cells_round_trip_through_named_fields() {
        let original = cells(&[
            "2024-01-01", "1001", "url", "A1, B2", "Vendor", "GB", "Type", "Supp", "Pic",
            "TBC (No)", "Ready | 15/01/2024", "Please Check VIN", "note", "",
        ]);
        assert_eq!(OrderRow::from_cells(&original).to_cells(), original);
    }

    #[test]
    fn removing_skus_keeps_etas_aligned() {
        let mut row = OrderRow::from_cells(&cells(&[
            "", "1001", "", "A1, B2, C3", "", "", "", "", "", "", "Ready | 3 - 4 Days | Awaiting Update",
        ]));
        assert!(row.remove_skus(&["B2", "ZZ"]));
        assert_eq!(row.skus, vec!["A1", "C3"]);
        assert_eq!(row.latest_etas, vec!["Ready", "Awaiting Update"]);
        assert!(!row.remove_skus(&["ZZ"]));
    }

    #[test]
    fn order_match_ignores_hash() {
        let row = OrderRow {
            order_number: "#MLP1001".into(),
            ..Default::default()
        };
        assert!(row.matches_order("MLP1001"));
        assert!(row.matches_order("#MLP1001"));
        assert!(!row.matches_order("MLP10011"));
    }

    #[test]
    fn set_eta_pads_missing_entries() {
        let mut row = OrderRow {
            skus: vec!["A".into(), "B".into()],
            ..Default::default()
        };
        assert_eq!(row.eta_at(1), None);
        row.set_eta(1, "20/02/2025");
        assert_eq!(row.latest_etas, vec!["", "20/02/2025"]);
        assert_eq!(row.eta_at(1), Some("20/02/2025"));
    }
}
