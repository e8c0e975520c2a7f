use crate::config::{AppConfig, StoreSettings};
use crate::gate::{AccessGate, SessionStore};
use crate::mailer::{FileForwarder, ForwardError, SmtpMailer};
use crate::reconciler::Reconciler;
use crate::record::FormCatalog;
use crate::store::{CsvStore, GoogleSheetsStore, MemoryStore, StoreError, TableStore};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub sessions: SessionStore,
    pub catalog: Arc<FormCatalog>,
    pub reconciler: Arc<Reconciler>,
    pub forwarder: Option<Arc<FileForwarder>>,
    pub upload_limit: usize,
}

pub const DEFAULT_UPLOAD_LIMIT: usize = 25 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mail(#[from] ForwardError),
}

impl AppState {
    pub fn new(
        gate: AccessGate,
        catalog: FormCatalog,
        reconciler: Reconciler,
        forwarder: Option<FileForwarder>,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            sessions: SessionStore::default(),
            catalog: Arc::new(catalog),
            reconciler: Arc::new(reconciler),
            forwarder: forwarder.map(Arc::new),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let store: Arc<dyn TableStore> = match &config.store {
            StoreSettings::Csv { path } => Arc::new(CsvStore::new(path.clone())),
            StoreSettings::GoogleSheets(settings) => {
                Arc::new(GoogleSheetsStore::new(settings.clone())?)
            }
            StoreSettings::Memory => Arc::new(MemoryStore::default()),
        };

        let forwarder = match &config.mail {
            Some(mail) => Some(FileForwarder::new(
                Arc::new(SmtpMailer::new(mail)?),
                mail.sender.clone(),
                mail.recipient.clone(),
            )),
            None => None,
        };

        Ok(Self::new(
            AccessGate::new(config.password.clone()),
            FormCatalog::new(
                config.title.clone(),
                config.variant,
                config.companies.clone(),
            ),
            Reconciler::new(store, config.cache_ttl, config.write_mode),
            forwarder,
        )
        .with_upload_limit(config.max_upload_bytes))
    }
}
