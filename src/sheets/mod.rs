pub mod google;
pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// How the store should interpret written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored as literal text.
    Raw,
    /// Parsed as if typed by a user, so `=…` becomes a formula.
    UserEntered,
}

impl ValueInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

#[derive(Debug)]
pub enum SheetsError {
    /// Rate limited or temporarily unavailable; safe to retry.
    Transient { status: u16, message: String },
    Api { status: u16, message: String },
    Auth(String),
    Transport(String),
    Decode(String),
    SheetNotFound(String),
}

impl SheetsError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 | 503 => SheetsError::Transient { status, message },
            _ => SheetsError::Api { status, message },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SheetsError::Transient { .. })
    }
}

impl std::fmt::Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsError::Transient { status, message } => {
                write!(f, "Sheets unavailable ({status}): {message}")
            }
            SheetsError::Api { status, message } => write!(f, "Sheets API error ({status}): {message}"),
            SheetsError::Auth(msg) => write!(f, "Sheets auth error: {msg}"),
            SheetsError::Transport(msg) => write!(f, "Sheets request failed: {msg}"),
            SheetsError::Decode(msg) => write!(f, "Sheets response invalid: {msg}"),
            SheetsError::SheetNotFound(name) => write!(f, "Sheet not found: {name}"),
        }
    }
}

/// Raw spreadsheet operations. One implementation talks to the Sheets REST
/// API; tests use the in-memory one.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Values in an A1 range. Trailing empty rows and cells are omitted.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;

    async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), SheetsError>;

    async fn batch_update_values(
        &self,
        data: &[ValueRange],
        input: ValueInput,
    ) -> Result<(), SheetsError>;

    /// Delete whole rows (0-based indices) in a single request, in the order given.
    async fn delete_rows(&self, sheet_id: i64, indices: &[usize]) -> Result<(), SheetsError>;

    /// `(title, sheet id)` for every sheet in the spreadsheet.
    async fn sheet_ids(&self) -> Result<Vec<(String, i64)>, SheetsError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each attempt after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Store client used by the reconciler. Mutations retry on transient errors
/// with exponential backoff; everything else propagates immediately.
#[derive(Clone)]
pub struct SheetsClient {
    api: Arc<dyn SheetsApi>,
    retry: RetryPolicy,
}

impl SheetsClient {
    pub fn new(api: Arc<dyn SheetsApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    pub async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        self.api.get_values(range).await
    }

    pub async fn update_range(
        &self,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        let api = &self.api;
        with_retry(&self.retry, range, move || api.update_values(range, rows, input)).await
    }

    pub async fn batch_update(
        &self,
        data: &[ValueRange],
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        if data.is_empty() {
            return Ok(());
        }
        let api = &self.api;
        with_retry(&self.retry, "batch update", move || {
            api.batch_update_values(data, input)
        })
        .await
    }

    pub async fn sheet_id(&self, name: &str) -> Result<i64, SheetsError> {
        self.api
            .sheet_ids()
            .await?
            .into_iter()
            .find(|(title, _)| title == name)
            .map(|(_, id)| id)
            .ok_or_else(|| SheetsError::SheetNotFound(name.to_string()))
    }

    /// Delete rows by 0-based index. Indices are sent highest first so each
    /// deletion leaves the remaining indices valid.
    pub async fn batch_delete_rows(
        &self,
        sheet_name: &str,
        mut indices: Vec<usize>,
    ) -> Result<(), SheetsError> {
        if indices.is_empty() {
            return Ok(());
        }
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        let sheet_id = self.sheet_id(sheet_name).await?;
        let api = &self.api;
        let rows = indices.as_slice();
        with_retry(&self.retry, sheet_name, move || api.delete_rows(sheet_id, rows)).await?;

        tracing::info!("Deleted rows {indices:?} from '{sheet_name}'");
        Ok(())
    }
}

async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, SheetsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SheetsError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Attempt {} failed for {what}: {e}; retrying in {delay:?}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!("Sheets call failed for {what} after {} attempt(s): {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}

/// A1 notation for `cells` on `sheet`, quoting the sheet title.
pub fn a1(sheet: &str, cells: &str) -> String {
    format!("'{}'!{cells}", sheet.replace('\'', "''"))
}

/// Split A1 notation into its unquoted sheet title and the cell part (which
/// may be empty when the whole sheet is addressed).
pub fn split_a1(range: &str) -> (String, &str) {
    if let Some(rest) = range.strip_prefix('\'') {
        let mut title = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    title.push('\'');
                    chars.next();
                    continue;
                }
                let after = &rest[i + 1..];
                return (title, after.strip_prefix('!').unwrap_or(after));
            }
            title.push(c);
        }
        return (title, "");
    }

    match range.split_once('!') {
        Some((sheet, cells)) => (sheet.to_string(), cells),
        None => (range.to_string(), ""),
    }
}
