use std::sync::Mutex;

use async_trait::async_trait;

use super::{split_a1, SheetsApi, SheetsError, ValueInput, ValueRange};

/// In-process spreadsheet. Formulas are stored verbatim and read back as
/// empty cells since there is no formula engine.
#[derive(Default)]
pub struct MemorySheets {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sheets: Vec<Sheet>,
    /// Transient failures to inject into upcoming mutating calls.
    pending_failures: u32,
    mutating_calls: u32,
}

struct Sheet {
    id: i64,
    title: String,
    rows: Vec<Vec<String>>,
}

/// Column/row bounds of an A1 range, 0-based and inclusive.
#[derive(Debug, PartialEq, Eq)]
struct Bounds {
    first_col: usize,
    last_col: Option<usize>,
    first_row: usize,
    last_row: Option<usize>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a sheet with the given rows.
    pub fn with_sheet(self, title: &str, rows: Vec<Vec<&str>>) -> Self {
        self.set_sheet(title, rows);
        self
    }

    pub fn set_sheet(&self, title: &str, rows: Vec<Vec<&str>>) {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(str::to_string).collect())
            .collect();
        let mut inner = self.lock();
        if let Some(sheet) = inner.sheets.iter_mut().find(|s| s.title == title) {
            sheet.rows = rows;
            return;
        }
        let id = inner.sheets.len() as i64 + 1;
        inner.sheets.push(Sheet {
            id,
            title: title.to_string(),
            rows,
        });
    }

    /// Stored cells of a sheet, with formulas unevaluated and trailing empty cells trimmed.
    pub fn raw_rows(&self, title: &str) -> Vec<Vec<String>> {
        let inner = self.lock();
        inner
            .sheets
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.rows.iter().map(|r| trim_row(r.clone())).collect())
            .unwrap_or_default()
    }

    /// Make the next `n` mutating calls fail with a 503.
    pub fn fail_next(&self, n: u32) {
        self.lock().pending_failures = n;
    }

    pub fn mutating_calls(&self) -> u32 {
        self.lock().mutating_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn begin_mutation(&mut self) -> Result<(), SheetsError> {
        self.mutating_calls += 1;
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(SheetsError::from_status(503, "The service is currently unavailable.".into()));
        }
        Ok(())
    }

    fn sheet_mut(&mut self, title: &str) -> Result<&mut Sheet, SheetsError> {
        self.sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| SheetsError::Api {
                status: 400,
                message: format!("Unable to parse range: {title}"),
            })
    }

    fn write(&mut self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        let (title, cells) = split_a1(range);
        let bounds = parse_bounds(cells)?;
        let sheet = self.sheet_mut(&title)?;

        for (offset, values) in rows.iter().enumerate() {
            let row_index = bounds.first_row + offset;
            if sheet.rows.len() <= row_index {
                sheet.rows.resize(row_index + 1, Vec::new());
            }
            let row = &mut sheet.rows[row_index];
            for (col_offset, value) in values.iter().enumerate() {
                let col = bounds.first_col + col_offset;
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col] = value.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SheetsApi for MemorySheets {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let (title, cells) = split_a1(range);
        let bounds = parse_bounds(cells)?;
        let mut inner = self.lock();
        let sheet = inner.sheet_mut(&title)?;

        let mut out: Vec<Vec<String>> = sheet
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= bounds.first_row && bounds.last_row.is_none_or(|last| *i <= last))
            .map(|(_, row)| {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .filter(|(c, _)| *c >= bounds.first_col && bounds.last_col.is_none_or(|last| *c <= last))
                    .map(|(_, v)| if v.starts_with('=') { String::new() } else { v.clone() })
                    .collect();
                trim_row(cells)
            })
            .collect();

        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
        _input: ValueInput,
    ) -> Result<(), SheetsError> {
        let mut inner = self.lock();
        inner.begin_mutation()?;
        inner.write(range, rows)
    }

    async fn batch_update_values(
        &self,
        data: &[ValueRange],
        _input: ValueInput,
    ) -> Result<(), SheetsError> {
        let mut inner = self.lock();
        inner.begin_mutation()?;
        for d in data {
            inner.write(&d.range, &d.values)?;
        }
        Ok(())
    }

    async fn delete_rows(&self, sheet_id: i64, indices: &[usize]) -> Result<(), SheetsError> {
        let mut inner = self.lock();
        inner.begin_mutation()?;
        let sheet = inner
            .sheets
            .iter_mut()
            .find(|s| s.id == sheet_id)
            .ok_or_else(|| SheetsError::Api {
                status: 400,
                message: format!("No grid with id: {sheet_id}"),
            })?;

        for &index in indices {
            if index < sheet.rows.len() {
                sheet.rows.remove(index);
            }
        }
        Ok(())
    }

    async fn sheet_ids(&self) -> Result<Vec<(String, i64)>, SheetsError> {
        let inner = self.lock();
        Ok(inner.sheets.iter().map(|s| (s.title.clone(), s.id)).collect())
    }
}

fn trim_row(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(|c| c.is_empty()) {
        row.pop();
    }
    row
}

fn parse_bounds(cells: &str) -> Result<Bounds, SheetsError> {
    if cells.is_empty() {
        return Ok(Bounds {
            first_col: 0,
            last_col: None,
            first_row: 0,
            last_row: None,
        });
    }

    let (start, end) = match cells.split_once(':') {
        Some((a, b)) => (a, Some(b)),
        None => (cells, None),
    };

    let (first_col, first_row) = parse_cell(start)?;
    let (last_col, last_row) = match end {
        Some(end) => parse_cell(end)?,
        // A single cell anchors a write; everything right of and below it is in range.
        None if first_row.is_some() => (None, None),
        None => (first_col, None),
    };

    Ok(Bounds {
        first_col: first_col.unwrap_or(0),
        last_col,
        first_row: first_row.unwrap_or(0),
        last_row,
    })
}

/// `"D12"` → `(Some(3), Some(11))`, `"D"` → `(Some(3), None)`.
fn parse_cell(cell: &str) -> Result<(Option<usize>, Option<usize>), SheetsError> {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &cell[letters.len()..];

    let col = if letters.is_empty() {
        None
    } else {
        Some(
            letters
                .to_ascii_uppercase()
                .bytes()
                .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
                - 1,
        )
    };

    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().map_err(|_| SheetsError::Api {
            status: 400,
            message: format!("Unable to parse range: {cell}"),
        })?;
        Some(n.saturating_sub(1))
    };

    Ok((col, row))
}
