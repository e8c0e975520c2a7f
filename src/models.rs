use crate::record::EntryDraft;
use crate::table::Table;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GateStatus {
    pub unlocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub company: String,
    pub entered_by: String,
    pub report_month: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl From<EntryRequest> for EntryDraft {
    fn from(request: EntryRequest) -> Self {
        Self {
            company: request.company,
            entered_by: request.entered_by,
            report_month: request.report_month,
            notes: request.notes,
            metrics: request.metrics,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub company: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<Table> for TableResponse {
    fn from(table: Table) -> Self {
        Self {
            columns: table.columns().to_vec(),
            rows: table.rows().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ForwardResponse {
    pub sent: bool,
    pub filename: String,
    pub bytes: usize,
}
