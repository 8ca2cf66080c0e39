use std::collections::{HashMap, HashSet};

use crate::sheets::{a1, SheetsClient, SheetsError};

const KEY_COL: usize = 1;
const BADGE_COL: usize = 2;
const STORE_COL: usize = 6;

/// Badges from the arrival sheet, keyed by SKU or vendor and optionally store.
#[derive(Debug, Clone, Default)]
pub struct EtaLookup {
    entries: HashMap<String, String>,
}

impl EtaLookup {
    /// Build from arrival sheet rows. The first row is a header.
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut entries = HashMap::new();
        for row in rows.iter().skip(1) {
            let key = cell(row, KEY_COL);
            if key.is_empty() {
                continue;
            }
            let badge = cell(row, BADGE_COL).to_string();
            let store = cell(row, STORE_COL).to_lowercase();

            // Scoped keys: last row wins. Bare keys: first non-empty badge wins.
            if !store.is_empty() {
                entries.insert(scoped(key, &store), badge.clone());
            }
            let bare = entries.entry(key.to_string()).or_default();
            if bare.is_empty() {
                *bare = badge;
            }
        }
        Self { entries }
    }

    /// First hit of `sku|store`, `sku`, `vendor|store`, `vendor`.
    pub fn find(&self, sku: &str, vendor: &str, store: &str) -> Option<String> {
        let store = store.to_lowercase();
        [scoped(sku, &store), sku.to_string(), scoped(vendor, &store), vendor.to_string()]
            .iter()
            .filter(|k| !k.is_empty() && !k.starts_with('|'))
            .find_map(|k| self.entries.get(k).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SKUs and barcodes listed on the web stock sheet.
#[derive(Debug, Clone, Default)]
pub struct StockSet {
    items: HashSet<String>,
}

impl StockSet {
    /// Build from web stock rows: column A SKU, column B barcode. The first row is a header.
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        Self::from_items(
            rows.iter()
                .skip(1)
                .flat_map(|r| [cell(r, 0), cell(r, 1)])
                .filter(|v| !v.is_empty()),
        )
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            items: items.into_iter().map(|s| s.as_ref().trim().to_string()).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        let value = value.trim();
        !value.is_empty() && self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EtaTables {
    pub lookup: EtaLookup,
    pub stock: StockSet,
}

impl EtaTables {
    pub async fn load(
        sheets: &SheetsClient,
        arrival_sheet: &str,
        web_stock_sheet: &str,
    ) -> Result<Self, SheetsError> {
        let arrival = sheets.read_range(&a1(arrival_sheet, "A:G")).await?;
        let stock = sheets.read_range(&a1(web_stock_sheet, "A:B")).await?;

        let tables = Self {
            lookup: EtaLookup::from_rows(&arrival),
            stock: StockSet::from_rows(&stock),
        };
        tracing::info!(
            "Loaded ETA tables: {} lookup keys, {} web stock entries",
            tables.lookup.len(),
            tables.stock.len()
        );
        Ok(tables)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn scoped(key: &str, store: &str) -> String {
    if key.is_empty() || store.is_empty() {
        return String::new();
    }
    format!("{key}|{store}")
}
