use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

pub const COL_TIMESTAMP: &str = "Entry Timestamp";
pub const COL_REPORT_MONTH: &str = "Report Month";
pub const COL_COMPANY: &str = "Company";
pub const COL_ENTERED_BY: &str = "Entered By";
pub const COL_NOTES: &str = "Notes";

/// Columns whose cells are always stored as text, never as numbers.
pub const TEXT_COLUMNS: [&str; 5] = [
    COL_TIMESTAMP,
    COL_REPORT_MONTH,
    COL_COMPANY,
    COL_ENTERED_BY,
    COL_NOTES,
];

pub const DEFAULT_COMPANIES: [&str; 6] = [
    "Pick Name Here",
    "Summer Fridays",
    "Thrive",
    "Trinity Solar",
    "ATI",
    "Rough Country",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Money,
    Count,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricField {
    pub key: &'static str,
    pub column: &'static str,
    pub label: &'static str,
    pub section: &'static str,
    pub kind: MetricKind,
}

const fn money(
    key: &'static str,
    column: &'static str,
    label: &'static str,
    section: &'static str,
) -> MetricField {
    MetricField {
        key,
        column,
        label,
        section,
        kind: MetricKind::Money,
    }
}

const fn count(
    key: &'static str,
    column: &'static str,
    label: &'static str,
    section: &'static str,
) -> MetricField {
    MetricField {
        key,
        column,
        label,
        section,
        kind: MetricKind::Count,
    }
}

const PERFORMANCE_FIELDS: [MetricField; 6] = [
    money("spend", "Spend", "Total Spend ($)", "Spend & Reach"),
    count("impressions", "Impressions", "Impressions", "Spend & Reach"),
    count("clicks", "Clicks", "Clicks", "Spend & Reach"),
    count("conversions", "Conversions", "Total Conversions", "Conversion Data"),
    count("qualified_leads", "Qualified Leads", "Qualified Leads (MQL/SQL)", "Conversion Data"),
    money("revenue", "Revenue", "Attributed Revenue ($)", "Revenue (Optional)"),
];

const ECOMMERCE_FIELDS: [MetricField; 8] = [
    money("digital_spend", "Total Digital Spend", "Total Digital Spend ($)", "Spend & Revenue"),
    money("total_revenue", "Total Revenue", "Total Revenue ($)", "Spend & Revenue"),
    money("gross_profit", "Gross Profit", "Gross Profit ($)", "Spend & Revenue"),
    count("total_orders", "Total Orders", "Total Orders", "Orders & Customers"),
    count("new_customers", "New Customers", "New Customers", "Orders & Customers"),
    count("repeat_customers", "Repeat Customers", "Repeat Customers", "Orders & Customers"),
    money(
        "rev_existing",
        "Rev Existing (Current Month)",
        "Revenue, Existing Customers, This Month ($)",
        "Retention",
    ),
    money(
        "rev_same_custs",
        "Rev Same Custs (Last Month)",
        "Revenue, Same Customers, Last Month ($)",
        "Retention",
    ),
];

/// Which record schema a deployment collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormVariant {
    Performance,
    Ecommerce,
}

impl FormVariant {
    pub fn metric_fields(self) -> &'static [MetricField] {
        match self {
            Self::Performance => &PERFORMANCE_FIELDS,
            Self::Ecommerce => &ECOMMERCE_FIELDS,
        }
    }

    pub fn columns(self) -> Vec<&'static str> {
        let mut columns = vec![COL_TIMESTAMP, COL_REPORT_MONTH, COL_COMPANY, COL_ENTERED_BY];
        columns.extend(self.metric_fields().iter().map(|field| field.column));
        columns.push(COL_NOTES);
        columns
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Ecommerce => "ecommerce",
        }
    }
}

impl FromStr for FormVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(Self::Performance),
            "ecommerce" => Ok(Self::Ecommerce),
            other => Err(format!("unknown form variant '{other}'")),
        }
    }
}

/// The form a deployment serves: its schema variant and the company list.
#[derive(Debug, Clone, Serialize)]
pub struct FormCatalog {
    pub title: String,
    pub variant: FormVariant,
    pub companies: Vec<String>,
    pub fields: &'static [MetricField],
}

impl FormCatalog {
    pub fn new(title: impl Into<String>, variant: FormVariant, companies: Vec<String>) -> Self {
        Self {
            title: title.into(),
            variant,
            companies,
            fields: variant.metric_fields(),
        }
    }

    pub fn has_company(&self, company: &str) -> bool {
        self.companies.iter().any(|known| known == company)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please fill in all fields.")]
    MissingSubmitter,
    #[error("'{0}' is not a known company")]
    UnknownCompany(String),
    #[error("'{0}' is not a field of this form")]
    UnknownMetric(String),
    #[error("{0} must be a number")]
    NotANumber(String),
    #[error("{0} must be zero or greater")]
    Negative(String),
    #[error("{0} must be a whole number")]
    NotWhole(String),
    #[error("Report Month must be a date like 2026-01-31")]
    InvalidDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Money(f64),
    Count(u64),
}

impl MetricValue {
    pub fn render(self) -> String {
        match self {
            Self::Money(value) => format!("{value:.2}"),
            Self::Count(value) => value.to_string(),
        }
    }
}

/// Unvalidated form input.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub company: String,
    pub entered_by: String,
    pub report_month: Option<NaiveDate>,
    pub notes: String,
    pub metrics: BTreeMap<String, f64>,
}

impl EntryDraft {
    /// Builds a draft from urlencoded form fields. Blank metric inputs count as zero.
    pub fn from_form(
        catalog: &FormCatalog,
        mut fields: BTreeMap<String, String>,
    ) -> Result<Self, ValidationError> {
        let mut draft = Self {
            company: fields.remove("company").unwrap_or_default(),
            entered_by: fields.remove("entered_by").unwrap_or_default(),
            notes: fields.remove("notes").unwrap_or_default(),
            ..Self::default()
        };

        if let Some(raw) = fields.remove("report_month").filter(|raw| !raw.trim().is_empty()) {
            let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| ValidationError::InvalidDate)?;
            draft.report_month = Some(date);
        }

        for field in catalog.fields {
            let Some(raw) = fields.remove(field.key) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let value = raw
                .parse::<f64>()
                .map_err(|_| ValidationError::NotANumber(field.label.to_string()))?;
            draft.metrics.insert(field.key.to_string(), value);
        }

        Ok(draft)
    }

    /// Validates the draft against the catalog and stamps it with `now`.
    pub fn into_record(
        self,
        catalog: &FormCatalog,
        now: NaiveDateTime,
    ) -> Result<Record, ValidationError> {
        if self.entered_by.trim().is_empty() {
            return Err(ValidationError::MissingSubmitter);
        }
        if !catalog.has_company(&self.company) {
            return Err(ValidationError::UnknownCompany(self.company));
        }
        if let Some(unknown) = self
            .metrics
            .keys()
            .find(|key| !catalog.fields.iter().any(|field| field.key == key.as_str()))
        {
            return Err(ValidationError::UnknownMetric(unknown.clone()));
        }

        let mut metrics = Vec::with_capacity(catalog.fields.len());
        for field in catalog.fields {
            let raw = self.metrics.get(field.key).copied().unwrap_or(0.0);
            if !raw.is_finite() {
                return Err(ValidationError::NotANumber(field.label.to_string()));
            }
            if raw < 0.0 {
                return Err(ValidationError::Negative(field.label.to_string()));
            }
            let value = match field.kind {
                MetricKind::Money => MetricValue::Money(raw),
                MetricKind::Count => {
                    if raw.fract() != 0.0 || raw >= u64::MAX as f64 {
                        return Err(ValidationError::NotWhole(field.label.to_string()));
                    }
                    MetricValue::Count(raw as u64)
                }
            };
            metrics.push((field.column, value));
        }

        Ok(Record {
            timestamp: now,
            report_month: self.report_month.unwrap_or_else(|| now.date()),
            company: self.company,
            entered_by: self.entered_by.trim().to_string(),
            metrics,
            notes: self.notes,
        })
    }
}

/// One submission, one row of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub report_month: NaiveDate,
    pub company: String,
    pub entered_by: String,
    pub metrics: Vec<(&'static str, MetricValue)>,
    pub notes: String,
}

impl Record {
    pub fn ensure_submittable(&self) -> Result<(), ValidationError> {
        if self.entered_by.trim().is_empty() {
            return Err(ValidationError::MissingSubmitter);
        }
        Ok(())
    }

    /// The record as `(column, cell)` pairs in schema order.
    pub fn to_row(&self) -> Vec<(&'static str, String)> {
        let mut row = Vec::with_capacity(self.metrics.len() + 5);
        row.push((COL_TIMESTAMP, self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()));
        row.push((COL_REPORT_MONTH, self.report_month.format("%Y-%m-%d").to_string()));
        row.push((COL_COMPANY, self.company.clone()));
        row.push((COL_ENTERED_BY, self.entered_by.clone()));
        row.extend(self.metrics.iter().map(|(column, value)| (*column, value.render())));
        row.push((COL_NOTES, self.notes.clone()));
        row
    }
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(variant: FormVariant) -> FormCatalog {
        FormCatalog::new(
            "Entry",
            variant,
            DEFAULT_COMPANIES.iter().map(|name| name.to_string()).collect(),
        )
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    fn draft(company: &str, entered_by: &str) -> EntryDraft {
        EntryDraft {
            company: company.to_string(),
            entered_by: entered_by.to_string(),
            ..EntryDraft::default()
        }
    }

    #[test]
    fn performance_row_follows_schema_order() {
        let catalog = catalog(FormVariant::Performance);
        let mut input = draft("Thrive", "Jane");
        input.metrics.insert("spend".into(), 100.0);
        input.metrics.insert("clicks".into(), 42.0);
        input.notes = "spring promo".into();

        let record = input.into_record(&catalog, noon()).unwrap();
        let row = record.to_row();
        let columns: Vec<&str> = row.iter().map(|(column, _)| *column).collect();

        assert_eq!(columns, FormVariant::Performance.columns());
        assert_eq!(row[0].1, "2026-03-14 12:30:05");
        assert_eq!(row[1].1, "2026-03-14");
        assert_eq!(row[4].1, "100.00");
        assert_eq!(row[6].1, "42");
        assert_eq!(row[10].1, "spring promo");
    }

    #[test]
    fn ecommerce_variant_has_retention_columns() {
        let columns = FormVariant::Ecommerce.columns();
        assert_eq!(columns.len(), 13);
        assert_eq!(columns[10], "Rev Existing (Current Month)");
        assert_eq!(columns[11], "Rev Same Custs (Last Month)");
        assert_eq!(columns[12], COL_NOTES);
    }

    #[test]
    fn blank_submitter_is_rejected() {
        let catalog = catalog(FormVariant::Performance);
        let err = draft("Thrive", "   ").into_record(&catalog, noon()).unwrap_err();
        assert_eq!(err, ValidationError::MissingSubmitter);
        assert_eq!(err.to_string(), "Please fill in all fields.");
    }

    #[test]
    fn unknown_company_is_rejected_but_placeholder_is_not() {
        let catalog = catalog(FormVariant::Performance);
        assert!(matches!(
            draft("Acme", "Jane").into_record(&catalog, noon()),
            Err(ValidationError::UnknownCompany(_))
        ));
        let record = draft("Pick Name Here", "Jane")
            .into_record(&catalog, noon())
            .unwrap();
        assert_eq!(record.company, "Pick Name Here");
    }

    #[test]
    fn metric_bounds_are_enforced() {
        let catalog = catalog(FormVariant::Performance);

        let mut negative = draft("ATI", "Jane");
        negative.metrics.insert("spend".into(), -1.0);
        assert!(matches!(
            negative.into_record(&catalog, noon()),
            Err(ValidationError::Negative(_))
        ));

        let mut fractional = draft("ATI", "Jane");
        fractional.metrics.insert("clicks".into(), 1.5);
        assert!(matches!(
            fractional.into_record(&catalog, noon()),
            Err(ValidationError::NotWhole(_))
        ));

        let mut overflowing = draft("ATI", "Jane");
        overflowing.metrics.insert("clicks".into(), 2f64.powi(64));
        assert!(matches!(
            overflowing.into_record(&catalog, noon()),
            Err(ValidationError::NotWhole(_))
        ));

        let mut foreign = draft("ATI", "Jane");
        foreign.metrics.insert("total_orders".into(), 3.0);
        assert!(matches!(
            foreign.into_record(&catalog, noon()),
            Err(ValidationError::UnknownMetric(_))
        ));
    }

    #[test]
    fn form_fields_parse_into_draft() {
        let catalog = catalog(FormVariant::Performance);
        let fields: BTreeMap<String, String> = [
            ("company", "Thrive"),
            ("entered_by", "Jane"),
            ("report_month", "2026-02-01"),
            ("spend", "12.5"),
            ("clicks", ""),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let draft = EntryDraft::from_form(&catalog, fields).unwrap();
        assert_eq!(draft.report_month, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(draft.metrics.get("spend"), Some(&12.5));
        assert!(!draft.metrics.contains_key("clicks"));

        let record = draft.into_record(&catalog, noon()).unwrap();
        assert_eq!(record.metrics[2], ("Clicks", MetricValue::Count(0)));
    }

    #[test]
    fn form_rejects_garbage_numbers() {
        let catalog = catalog(FormVariant::Performance);
        let mut fields = BTreeMap::new();
        fields.insert("spend".to_string(), "lots".to_string());
        assert!(matches!(
            EntryDraft::from_form(&catalog, fields),
            Err(ValidationError::NotANumber(_))
        ));
    }

    #[test]
    fn report_month_defaults_to_today() {
        let catalog = catalog(FormVariant::Ecommerce);
        let record = draft("ATI", "Jane").into_record(&catalog, noon()).unwrap();
        assert_eq!(record.report_month, noon().date());
        assert_eq!(record.metrics.len(), 8);
    }
}
