use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{SheetsApi, SheetsError, ValueInput, ValueRange};
use crate::google::TokenSource;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Sheets v4 REST client bound to one spreadsheet.
pub struct GoogleSheets {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    tokens: TokenSource,
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    sheet_id: i64,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: &str, tokens: TokenSource) -> Result<Self, String> {
        Self::with_base(DEFAULT_API_BASE, spreadsheet_id, tokens)
    }

    pub fn with_base(api_base: &str, spreadsheet_id: &str, tokens: TokenSource) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {e}"))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens,
        })
    }

    /// `{base}/{spreadsheet id}{suffix}` followed by the given path segments.
    fn url(&self, suffix: &str, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&format!("{}/{}{suffix}", self.api_base, self.spreadsheet_id))
            .map_err(|e| SheetsError::Transport(format!("Invalid Sheets URL: {e}")))?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| SheetsError::Transport("Sheets URL cannot have a path".into()))?
                .extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SheetsError> {
        let token = self.tokens.access_token().await.map_err(SheetsError::Auth)?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = body.chars().take(512).collect::<String>();
        Err(SheetsError::from_status(status.as_u16(), message))
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetsApi for GoogleSheets {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url("", &["values", range])?;
        let resp = self.send(self.client.get(url)).await?;
        let body: ValuesResponse = resp
            .json()
            .await
            .map_err(|e| SheetsError::Decode(e.to_string()))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        let mut url = self.url("", &["values", range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", input.as_str());

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn batch_update_values(
        &self,
        data: &[ValueRange],
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        let url = self.url("/values:batchUpdate", &[])?;
        let data: Vec<Value> = data
            .iter()
            .map(|d| json!({ "range": d.range, "majorDimension": "ROWS", "values": d.values }))
            .collect();
        let body = json!({
            "valueInputOption": input.as_str(),
            "data": data,
        });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_rows(&self, sheet_id: i64, indices: &[usize]) -> Result<(), SheetsError> {
        let url = self.url(":batchUpdate", &[])?;
        let requests: Vec<Value> = indices
            .iter()
            .map(|&i| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": i,
                            "endIndex": i + 1,
                        }
                    }
                })
            })
            .collect();
        self.send(self.client.post(url).json(&json!({ "requests": requests })))
            .await?;
        Ok(())
    }

    async fn sheet_ids(&self) -> Result<Vec<(String, i64)>, SheetsError> {
        let mut url = self.url("", &[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let resp = self.send(self.client.get(url)).await?;
        let body: SpreadsheetResponse = resp
            .json()
            .await
            .map_err(|e| SheetsError::Decode(e.to_string()))?;

        Ok(body
            .sheets
            .into_iter()
            .map(|s| (s.properties.title, s.properties.sheet_id))
            .collect())
    }
}
