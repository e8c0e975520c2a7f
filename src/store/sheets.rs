use super::{Snapshot, StoreError, TableStore, Version, WriteCondition};
use crate::record::TEXT_COLUMNS;
use crate::table::Table;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::time::Duration;
use tracing::{debug, warn};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub endpoint: String,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub access_token: String,
    pub timeout: Duration,
}

/// A worksheet in a Google spreadsheet, addressed through the v4 values API.
pub struct GoogleSheetsStore {
    client: Client,
    settings: SheetsSettings,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsStore {
    pub fn new(settings: SheetsSettings) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.settings.endpoint.trim_end_matches('/'),
            utf8_percent_encode(&self.settings.spreadsheet_id, PATH_SEGMENT),
            utf8_percent_encode(range, PATH_SEGMENT),
            suffix,
        )
    }

    /// A1 range covering every row from `first_row` (1-based) down.
    fn rows_from(&self, first_row: usize) -> String {
        format!(
            "'{}'!A{first_row}:ZZZ",
            self.settings.worksheet.replace('\'', "''")
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(&self.settings.access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch(&self) -> Result<Table, StoreError> {
        let request = self
            .client
            .get(self.values_url(&self.settings.worksheet, ""))
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("dateTimeRenderOption", "FORMATTED_STRING"),
            ]);
        let range: ValueRange = self.send(request).await?.json().await?;
        let grid = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Ok(Table::from_grid(grid))
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Header and text columns go out as strings, plain decimal cells as numbers.
fn typed_grid(table: &Table) -> Vec<Vec<Value>> {
    let columns = table.columns();
    if columns.is_empty() {
        return Vec::new();
    }
    let mut grid = Vec::with_capacity(table.len() + 1);
    grid.push(columns.iter().cloned().map(Value::String).collect());
    for row in table.rows() {
        grid.push(
            columns
                .iter()
                .zip(row)
                .map(|(column, text)| cell_value(column, text))
                .collect(),
        );
    }
    grid
}

fn cell_value(column: &str, text: &str) -> Value {
    if TEXT_COLUMNS.contains(&column) {
        return Value::String(text.to_string());
    }
    numeric_cell(text).unwrap_or_else(|| Value::String(text.to_string()))
}

/// Parses `-?digits(.digits)?` without leading zeros; anything else stays text.
fn numeric_cell(text: &str) -> Option<Value> {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let plain = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !plain(whole) || fraction.is_some_and(|part| !plain(part)) {
        return None;
    }
    if whole.len() > 1 && whole.starts_with('0') {
        return None;
    }
    match fraction {
        None => text.parse::<i64>().ok().map(Value::from),
        Some(_) => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
    }
}

#[async_trait]
impl TableStore for GoogleSheetsStore {
    fn backend_tag(&self) -> &'static str {
        "google-sheets"
    }

    async fn read(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::new(self.fetch().await?))
    }

    /// Overwrites the worksheet from the top, then clears rows left below it.
    ///
    /// The grid is written before anything is cleared, so a failed write
    /// leaves the previous contents in place.
    async fn write(
        &self,
        table: &Table,
        condition: WriteCondition,
    ) -> Result<Version, StoreError> {
        // The values API has no conditional write; re-read right before writing.
        if condition != WriteCondition::Unconditional {
            let current = Version::of(&self.fetch().await?);
            condition.check(&current)?;
        }

        let values = typed_grid(table);
        let written = values.len();
        let body = ValueRangeBody {
            range: &self.settings.worksheet,
            major_dimension: "ROWS",
            values,
        };
        let update = self
            .client
            .put(self.values_url(&self.settings.worksheet, ""))
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(update).await?;

        let tail = self.rows_from(written + 1);
        let clear = self
            .client
            .post(self.values_url(&tail, ":clear"))
            .json(&serde_json::json!({}));
        if let Err(err) = self.send(clear).await {
            warn!(range = %tail, "rows below the table were not cleared: {err}");
        }

        debug!(rows = table.len(), "worksheet rewritten");
        Ok(Version::of(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_decimals_become_numbers() {
        assert_eq!(numeric_cell("250"), Some(json!(250)));
        assert_eq!(numeric_cell("10.5"), Some(json!(10.5)));
        assert_eq!(numeric_cell("-3.25"), Some(json!(-3.25)));
        assert_eq!(numeric_cell("0.40"), Some(json!(0.4)));
    }

    #[test]
    fn other_text_stays_text() {
        for text in ["", "0042", "+5", "1e5", "inf", "NaN", "1.", ".5", "12 units", "2026-03-01"] {
            assert_eq!(numeric_cell(text), None, "{text:?}");
        }
    }

    #[test]
    fn text_columns_are_never_converted() {
        assert_eq!(cell_value("Notes", "12"), json!("12"));
        assert_eq!(cell_value("Entered By", "7"), json!("7"));
        assert_eq!(cell_value("Spend", "12"), json!(12));
        assert_eq!(cell_value("Spend", "n/a"), json!("n/a"));
    }
}
