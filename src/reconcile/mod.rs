pub mod formulas;
pub mod rows;

use chrono::{NaiveDate, Utc};
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::eta::tables::EtaTables;
use crate::eta::{self, EtaQuery};
use crate::models::row::column;
use crate::models::{OrderPayload, OrderRow, Store};
use crate::sheets::{a1, SheetsClient, SheetsError, ValueInput, ValueRange};

#[derive(Debug)]
pub enum ReconcileError {
    Sheets(SheetsError),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Sheets(e) => write!(f, "{e}"),
        }
    }
}

impl From<SheetsError> for ReconcileError {
    fn from(e: SheetsError) -> Self {
        ReconcileError::Sheets(e)
    }
}

/// Where the reconciler reads and writes.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub uk: String,
    pub us: String,
    pub eu: String,
    pub arrival: String,
    pub web_stock: String,
    pub order_admin_url: String,
}

impl SheetLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            uk: config.stores.uk.sheet_name.clone(),
            us: config.stores.us.sheet_name.clone(),
            eu: config.stores.eu.sheet_name.clone(),
            arrival: config.sheets.arrival_sheet.clone(),
            web_stock: config.sheets.web_stock_sheet.clone(),
            order_admin_url: config.sheets.order_admin_url.clone(),
        }
    }

    pub fn orders(&self, store: Store) -> &str {
        match store {
            Store::Uk => &self.uk,
            Store::Us => &self.us,
            Store::Eu => &self.eu,
        }
    }
}

/// A line item with the ETA resolved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEta {
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub eta: String,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Applied { rows: usize, items: Vec<ItemEta> },
    /// The order number is already on the sheet.
    Duplicate,
    /// The order has no line items.
    Empty,
}

#[derive(Debug, Default, PartialEq)]
pub struct Removal {
    pub deleted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EtaChange {
    pub sku: String,
    pub previous: String,
    pub current: String,
}

#[derive(Debug, Default)]
pub struct EtaRefresh {
    /// SKUs whose recorded ETA differed from the fresh one.
    pub changes: Vec<EtaChange>,
    pub items: Vec<ItemEta>,
}

/// Applies orders to the per-store order sheets.
pub struct Reconciler {
    sheets: SheetsClient,
    layout: SheetLayout,
    tables: OnceCell<EtaTables>,
}

impl Reconciler {
    pub fn new(sheets: SheetsClient, layout: SheetLayout) -> Self {
        Self {
            sheets,
            layout,
            tables: OnceCell::new(),
        }
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Append an order's rows unless its number is already on the sheet,
    /// then recompute formulas and clean up placeholder and duplicate rows.
    pub async fn apply_order(
        &self,
        store: Store,
        order: &OrderPayload,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let sheet = self.layout.orders(store);

        let numbers = self
            .sheets
            .read_range(&a1(sheet, &format!("{0}:{0}", column::ORDER_NUMBER)))
            .await?;
        if numbers
            .iter()
            .any(|r| r.first().is_some_and(|n| *n == order.order_number))
        {
            tracing::warn!("Order {} already on '{sheet}', skipping", order.order_number);
            return Ok(ApplyOutcome::Duplicate);
        }

        if order.line_items.is_empty() {
            tracing::info!("Order {} has no line items, nothing to add", order.order_number);
            return Ok(ApplyOutcome::Empty);
        }

        let items = self.resolve_items(store, order).await;
        let etas: Vec<String> = items.iter().map(|i| i.eta.clone()).collect();
        let new_rows = rows::build_rows(order, &etas, &self.layout.order_admin_url);

        let existing = self.sheets.read_range(&a1(sheet, "A:N")).await?;
        let start = (existing.len() + 1).max(formulas::FIRST_DATA_ROW);
        let end = start + new_rows.len() - 1;
        let cells: Vec<Vec<String>> = new_rows.iter().map(OrderRow::to_cells).collect();
        self.sheets
            .update_range(&a1(sheet, &format!("A{start}:N{end}")), &cells, ValueInput::Raw)
            .await?;
        tracing::info!(
            "Added {} row(s) for order {} to '{sheet}' at row {start}",
            new_rows.len(),
            order.order_number
        );

        self.apply_formulas(sheet, end).await?;
        self.delete_placeholder_rows(sheet).await?;
        self.delete_duplicate_rows(sheet).await?;

        Ok(ApplyOutcome::Applied {
            rows: new_rows.len(),
            items,
        })
    }

    /// Write the G/H/I lookup formulas for every data row up to `last_row`.
    pub async fn apply_formulas(&self, sheet: &str, last_row: usize) -> Result<(), ReconcileError> {
        let cells = formulas::rows(last_row);
        if cells.is_empty() {
            return Ok(());
        }
        let range = a1(
            sheet,
            &format!(
                "{}{}:{}{last_row}",
                column::ASSIGN_TYPE,
                formulas::FIRST_DATA_ROW,
                column::PIC
            ),
        );
        self.sheets
            .update_range(&range, &cells, ValueInput::UserEntered)
            .await?;
        tracing::debug!("Applied formulas to '{sheet}' rows 2..={last_row}");
        Ok(())
    }

    pub async fn delete_placeholder_rows(&self, sheet: &str) -> Result<usize, ReconcileError> {
        let all = self.sheets.read_range(&a1(sheet, "A:N")).await?;
        let indices = rows::placeholder_indices(&all);
        let count = indices.len();
        self.sheets.batch_delete_rows(sheet, indices).await?;
        Ok(count)
    }

    pub async fn delete_duplicate_rows(&self, sheet: &str) -> Result<usize, ReconcileError> {
        let all = self.sheets.read_range(&a1(sheet, "A:N")).await?;
        let indices = rows::duplicate_indices(&all);
        let count = indices.len();
        if count > 0 {
            tracing::warn!("Removing {count} duplicate row(s) from '{sheet}'");
        }
        self.sheets.batch_delete_rows(sheet, indices).await?;
        Ok(count)
    }

    /// Drop fulfilled SKUs from an order's rows; with no line items the
    /// whole order is removed.
    pub async fn remove_fulfilled(
        &self,
        store: Store,
        order: &OrderPayload,
    ) -> Result<Removal, ReconcileError> {
        let sheet = self.layout.orders(store);
        let all = self.sheets.read_range(&a1(sheet, "A:N")).await?;

        let skus: Vec<&str> = order.line_items.iter().map(|i| i.sku_or_default()).collect();
        let plan = rows::plan_removal(&all, &order.order_number, &skus);
        if plan.is_empty() {
            tracing::info!("No rows to remove for order {} in '{sheet}'", order.order_number);
            return Ok(Removal::default());
        }

        let updates: Vec<ValueRange> = plan
            .rewrite
            .iter()
            .flat_map(|(index, row)| {
                let r = index + 1;
                [
                    ValueRange {
                        range: a1(sheet, &format!("{}{r}", column::SKU)),
                        values: vec![vec![row.sku_cell()]],
                    },
                    ValueRange {
                        range: a1(sheet, &format!("{}{r}", column::LATEST_ETA)),
                        values: vec![vec![row.eta_cell()]],
                    },
                ]
            })
            .collect();
        self.sheets.batch_update(&updates, ValueInput::Raw).await?;

        let removal = Removal {
            deleted: plan.delete.len(),
            updated: plan.rewrite.len(),
        };
        self.sheets.batch_delete_rows(sheet, plan.delete).await?;

        tracing::info!(
            "Order {}: removed {} row(s), updated {} row(s) in '{sheet}'",
            order.order_number,
            removal.deleted,
            removal.updated
        );
        Ok(removal)
    }

    /// Re-resolve ETAs for an order and rewrite column K where they changed.
    /// SKUs with no ETA on record get one written but are not reported.
    pub async fn refresh_etas(
        &self,
        store: Store,
        order: &OrderPayload,
    ) -> Result<EtaRefresh, ReconcileError> {
        let sheet = self.layout.orders(store);
        let all = self.sheets.read_range(&a1(sheet, "A:N")).await?;
        let items = self.resolve_items(store, order).await;

        let mut changes = Vec::new();
        let mut updates = Vec::new();

        for (index, cells) in all.iter().enumerate().skip(1) {
            let mut row = OrderRow::from_cells(cells);
            if !row.matches_order(&order.order_number) {
                continue;
            }
            let before = row.eta_cell();

            for item in &items {
                let Some(pos) = row.skus.iter().position(|s| *s == item.sku) else {
                    continue;
                };
                let previous = row.eta_at(pos).unwrap_or("").to_string();
                if previous == item.eta {
                    continue;
                }
                if !previous.is_empty() {
                    changes.push(EtaChange {
                        sku: item.sku.clone(),
                        previous,
                        current: item.eta.clone(),
                    });
                }
                row.set_eta(pos, &item.eta);
            }

            if row.eta_cell() != before {
                updates.push(ValueRange {
                    range: a1(sheet, &format!("{}{}", column::LATEST_ETA, index + 1)),
                    values: vec![vec![row.eta_cell()]],
                });
            }
        }

        self.sheets.batch_update(&updates, ValueInput::Raw).await?;
        if !changes.is_empty() {
            tracing::info!(
                "Order {}: {} ETA change(s) in '{sheet}'",
                order.order_number,
                changes.len()
            );
        }

        Ok(EtaRefresh { changes, items })
    }

    /// Record an ETA for the first SKU on the order containing `sku`.
    /// Returns false when no such row exists.
    pub async fn record_eta(
        &self,
        store: Store,
        order_number: &str,
        sku: &str,
        eta: &str,
    ) -> Result<bool, ReconcileError> {
        let sheet = self.layout.orders(store);
        let all = self.sheets.read_range(&a1(sheet, "A:N")).await?;

        for (index, cells) in all.iter().enumerate().skip(1) {
            let mut row = OrderRow::from_cells(cells);
            if !row.matches_order(order_number) {
                continue;
            }
            let Some(pos) = row.skus.iter().position(|s| s.contains(sku)) else {
                continue;
            };
            row.set_eta(pos, eta);
            self.sheets
                .update_range(
                    &a1(sheet, &format!("{}{}", column::LATEST_ETA, index + 1)),
                    &[vec![row.eta_cell()]],
                    ValueInput::Raw,
                )
                .await?;
            tracing::info!("Recorded ETA {eta} for {order_number} / {sku} in '{sheet}'");
            return Ok(true);
        }

        tracing::warn!("No row for {order_number} / {sku} in '{sheet}'");
        Ok(false)
    }

    async fn resolve_items(&self, store: Store, order: &OrderPayload) -> Vec<ItemEta> {
        let fallback;
        let tables = match self.eta_tables().await {
            Some(tables) => tables,
            None => {
                fallback = EtaTables::default();
                &fallback
            }
        };

        let created = eta::parse_order_date(&order.order_created).unwrap_or_else(today);
        order
            .line_items
            .iter()
            .map(|item| {
                let query = EtaQuery {
                    sku: item.sku_or_default(),
                    vendor: item.vendor_or_default(),
                    store: store.code(),
                    barcode: item.barcode.as_deref().unwrap_or(""),
                    inventory: item.inventory,
                    order_created: created,
                };
                ItemEta {
                    sku: item.sku_or_default().to_string(),
                    title: item.title.clone(),
                    quantity: item.quantity,
                    eta: eta::resolve(&query, &tables.lookup, &tables.stock),
                }
            })
            .collect()
    }

    /// ETA tables, loaded on first use and kept for the process lifetime.
    /// A failed load is not cached.
    async fn eta_tables(&self) -> Option<&EtaTables> {
        let loaded = self
            .tables
            .get_or_try_init(|| {
                EtaTables::load(&self.sheets, &self.layout.arrival, &self.layout.web_stock)
            })
            .await;
        match loaded {
            Ok(tables) => Some(tables),
            Err(e) => {
                tracing::warn!("ETA tables unavailable, resolving without them: {e}");
                None
            }
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
