use crate::reconciler::WriteMode;
use crate::record::{DEFAULT_COMPANIES, FormVariant};
use crate::store::SheetsSettings;
use lettre::message::Mailbox;
use std::{env::VarError, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub enum StoreSettings {
    Csv { path: PathBuf },
    GoogleSheets(SheetsSettings),
    Memory,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: Mailbox,
    pub recipient: Mailbox,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub password: String,
    pub title: String,
    pub variant: FormVariant,
    pub companies: Vec<String>,
    pub store: StoreSettings,
    pub cache_ttl: Duration,
    pub write_mode: WriteMode,
    pub mail: Option<MailSettings>,
    pub max_upload_bytes: usize,
}

/// Reads the configuration from the process environment, after loading `.env` if present.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key))
}

/// Builds the configuration from an arbitrary variable lookup.
pub fn build_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let optional = |var: &str| lookup(var).ok().filter(|value| !value.trim().is_empty());
    let require = |var: &str| optional(var).ok_or_else(|| ConfigError::MissingEnvVar(var.into()));
    let or_default = |var: &str, default: &str| optional(var).unwrap_or_else(|| default.into());
    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let port = or_default("PORT", "8080")
        .parse::<u16>()
        .map_err(|err| invalid("PORT", err.to_string()))?;
    let password = require("APP_PASSWORD")?;
    let title = or_default("APP_TITLE", "Performance Marketing Entry");
    let variant = or_default("FORM_VARIANT", "performance")
        .parse::<FormVariant>()
        .map_err(|err| invalid("FORM_VARIANT", err))?;

    let companies: Vec<String> = match optional("COMPANIES") {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        None => DEFAULT_COMPANIES.iter().map(|name| name.to_string()).collect(),
    };
    if companies.len() < 2 {
        return Err(invalid(
            "COMPANIES",
            "expected a placeholder followed by at least one company".to_string(),
        ));
    }

    let worksheet = or_default("SHEET_WORKSHEET", "Sheet1");
    let store = match or_default("SHEET_BACKEND", "csv").to_ascii_lowercase().as_str() {
        "csv" => StoreSettings::Csv {
            path: PathBuf::from(or_default("APP_DATA_PATH", "data/entries.csv")),
        },
        "google" => StoreSettings::GoogleSheets(SheetsSettings {
            endpoint: or_default("GOOGLE_SHEETS_ENDPOINT", "https://sheets.googleapis.com"),
            spreadsheet_id: require("GOOGLE_SHEETS_ID")?,
            worksheet,
            access_token: require("GOOGLE_SHEETS_TOKEN")?,
            timeout: Duration::from_secs(30),
        }),
        "memory" => StoreSettings::Memory,
        other => {
            return Err(invalid(
                "SHEET_BACKEND",
                format!("unknown backend '{other}'"),
            ));
        }
    };

    let cache_ttl = or_default("TABLE_CACHE_TTL_SECS", "5")
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|err| invalid("TABLE_CACHE_TTL_SECS", err.to_string()))?;
    let write_mode = or_default("WRITE_MODE", "optimistic")
        .parse::<WriteMode>()
        .map_err(|err| invalid("WRITE_MODE", err))?;
    let max_upload_bytes = or_default("MAX_UPLOAD_BYTES", "26214400")
        .parse::<usize>()
        .map_err(|err| invalid("MAX_UPLOAD_BYTES", err.to_string()))?;

    let mail = match (optional("SMTP_USERNAME"), optional("SMTP_PASSWORD")) {
        (Some(username), Some(password)) => {
            let mailbox = |var: &str, raw: String| {
                raw.parse::<Mailbox>()
                    .map_err(|err| invalid(var, err.to_string()))
            };
            let sender = mailbox(
                "MAIL_SENDER",
                optional("MAIL_SENDER").unwrap_or_else(|| username.clone()),
            )?;
            let recipient = mailbox("MAIL_RECIPIENT", require("MAIL_RECIPIENT")?)?;
            let port = or_default("SMTP_PORT", "465")
                .parse::<u16>()
                .map_err(|err| invalid("SMTP_PORT", err.to_string()))?;
            Some(MailSettings {
                host: or_default("SMTP_HOST", "smtp.gmail.com"),
                port,
                username,
                password,
                sender,
                recipient,
            })
        }
        _ => None,
    };

    Ok(AppConfig {
        port,
        password,
        title,
        variant,
        companies,
        store,
        cache_ttl,
        write_mode,
        mail,
        max_upload_bytes,
    })
}
