//! Delivery estimates for line items.
//!
//! An item's ETA comes from its stock level, the web stock list, or a badge in
//! the arrival lookup sheet. Badges describing a lead time or a month are
//! turned into a concrete `DD/MM/YYYY` date relative to the order date.

pub mod tables;

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;

pub use tables::{EtaLookup, StockSet};

pub const READY: &str = "Ready";
pub const AWAITING_UPDATE: &str = "Awaiting Update";
pub const NOT_AVAILABLE: &str = "ETA Not Available";
pub const WEB_STOCK_BADGE: &str = "3 - 4 Days";
const STOCK_ORDER_LEAD_TIME: &str = "2 weeks";
const DATE_FORMAT: &str = "%d/%m/%Y";

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// The line-item facts an ETA depends on.
#[derive(Debug, Clone)]
pub struct EtaQuery<'a> {
    pub sku: &'a str,
    pub vendor: &'a str,
    pub store: &'a str,
    pub barcode: &'a str,
    /// Units available at the fulfilling location; `None` when unknown.
    pub inventory: Option<i64>,
    pub order_created: NaiveDate,
}

/// Resolve the ETA text for one line item.
pub fn resolve(query: &EtaQuery<'_>, lookup: &EtaLookup, stock: &StockSet) -> String {
    if query.inventory.is_some_and(|n| n >= 0) {
        return READY.to_string();
    }

    let badge = if stock.contains(query.sku) || stock.contains(query.barcode) {
        Some(WEB_STOCK_BADGE.to_string())
    } else {
        lookup.find(query.sku, query.vendor, query.store)
    };

    match badge {
        Some(badge) => interpret_badge(&badge, query.order_created),
        None => AWAITING_UPDATE.to_string(),
    }
}

/// Turn a badge into the text shown to customers.
pub fn interpret_badge(badge: &str, order_created: NaiveDate) -> String {
    let badge = badge.trim();
    if badge.is_empty() {
        return AWAITING_UPDATE.to_string();
    }

    let badge = if badge.eq_ignore_ascii_case("stock order") {
        STOCK_ORDER_LEAD_TIME
    } else {
        badge
    };
    let lower = badge.to_lowercase();

    if lower.contains("day") || lower.contains("week") {
        return match lead_time_days(badge) {
            Some(days) => format_date(add_business_days(order_created, days)),
            None => NOT_AVAILABLE.to_string(),
        };
    }

    if let Some(date) = month_date(badge, order_created) {
        return format_date(date);
    }

    if lower.contains("no eta") {
        return AWAITING_UPDATE.to_string();
    }

    badge.to_string()
}

/// Longest lead time, in business days, that resolves to a date.
pub const MAX_LEAD_TIME_DAYS: u32 = 520;

/// Business days in a lead-time badge: the last number, times five for weeks.
/// `"3 - 4 Days"` → 4, `"2 weeks"` → 10. `None` past [`MAX_LEAD_TIME_DAYS`].
pub fn lead_time_days(badge: &str) -> Option<u32> {
    let n: u32 = NUMBER_RE.find_iter(badge).last()?.as_str().parse().ok()?;
    let days = if badge.to_lowercase().contains("week") {
        n.checked_mul(5)?
    } else {
        n
    };
    (1..=MAX_LEAD_TIME_DAYS).contains(&days).then_some(days)
}

/// Add business days (Monday to Friday) to a date.
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut added = 0;
    while added < days {
        date = date.succ_opt().unwrap_or(date);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            added += 1;
        }
    }
    date
}

/// Resolve a badge naming a month (`"Early March"`, `"Mid Jan 2026"`) to a date.
fn month_date(badge: &str, order_created: NaiveDate) -> Option<NaiveDate> {
    let lower = badge.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let month = words.iter().find_map(|w| month_number(w))?;

    let day = if words.contains(&"early") {
        5
    } else if words.contains(&"mid") {
        15
    } else if words.contains(&"late") {
        25
    } else {
        1
    };

    let explicit_year = YEAR_RE
        .captures(&lower)
        .and_then(|c| c[1].parse::<i32>().ok());
    let year = explicit_year.unwrap_or_else(|| {
        if month < order_created.month() {
            order_created.year() + 1
        } else {
            order_created.year()
        }
    });

    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(word: &str) -> Option<u32> {
    if word == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| *m == word || (word.len() == 3 && m.starts_with(word)))
        .map(|i| i as u32 + 1)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse the order's creation timestamp (ISO-8601, with or without offset)
/// to the calendar date in its own timezone.
pub fn parse_order_date(created: &str) -> Option<NaiveDate> {
    let created = created.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(created) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(created, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(created, "%Y-%m-%d").ok()
}
