//! Turns one validated [`Record`] into an updated persisted table.
//!
//! Each submission reads the whole table, appends the new row in memory and
//! writes the whole table back. Under [`WriteMode::Optimistic`] the write is
//! conditional on the table being unchanged since it was read; under
//! [`WriteMode::LastWriteWins`] it is an unconditional overwrite, so of two
//! racing submissions only the later one survives.

use crate::cache::TableCache;
use crate::record::{Record, ValidationError};
use crate::store::{StoreError, TableStore, Version, WriteCondition};
use crate::table::Table;
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Optimistic,
    LastWriteWins,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "last-write-wins" | "last_write_wins" => Ok(Self::LastWriteWins),
            other => Err(format!("unknown write mode '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("the table was changed by another submission; submit again")]
    Conflict,
    #[error("failed to save the table: {0}")]
    Store(StoreError),
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub rows: usize,
    pub version: Version,
}

pub struct Reconciler {
    store: Arc<dyn TableStore>,
    cache: TableCache,
    mode: WriteMode,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TableStore>, cache_ttl: Duration, mode: WriteMode) -> Self {
        Self {
            store,
            cache: TableCache::new(cache_ttl),
            mode,
        }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn backend_tag(&self) -> &'static str {
        self.store.backend_tag()
    }

    /// The table as the next submission would see it.
    pub async fn current_table(&self) -> Result<Table, StoreError> {
        Ok(self.cache.read(self.store.as_ref()).await?.table)
    }

    pub async fn submit(&self, record: &Record) -> Result<SubmitOutcome, SubmitError> {
        record.ensure_submittable()?;

        let (mut table, seen) = match self.cache.read(self.store.as_ref()).await {
            Ok(snapshot) => (snapshot.table, snapshot.version),
            Err(err) => {
                warn!(
                    backend = self.store.backend_tag(),
                    "table read failed, continuing with an empty table: {err}"
                );
                let empty = Table::default();
                let version = Version::of(&empty);
                (empty, version)
            }
        };

        table.append(record.to_row());

        let condition = match self.mode {
            WriteMode::Optimistic => WriteCondition::IfVersion(seen),
            WriteMode::LastWriteWins => WriteCondition::Unconditional,
        };

        let version = match self.store.write(&table, condition).await {
            Ok(version) => version,
            Err(StoreError::Conflict) => {
                warn!(company = %record.company, "table changed underneath submission");
                self.cache.invalidate().await;
                return Err(SubmitError::Conflict);
            }
            Err(err) => {
                error!(company = %record.company, "failed to write table: {err}");
                return Err(SubmitError::Store(err));
            }
        };

        self.cache.invalidate().await;
        info!(
            company = %record.company,
            entered_by = %record.entered_by,
            rows = table.len(),
            version = %version,
            "entry appended"
        );

        Ok(SubmitOutcome {
            rows: table.len(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DEFAULT_COMPANIES, EntryDraft, FormCatalog, FormVariant};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn catalog() -> FormCatalog {
        FormCatalog::new(
            "Entry",
            FormVariant::Performance,
            DEFAULT_COMPANIES.iter().map(|name| name.to_string()).collect(),
        )
    }

    fn record(company: &str, entered_by: &str, spend: f64) -> Record {
        let mut draft = EntryDraft {
            company: company.to_string(),
            entered_by: entered_by.to_string(),
            ..EntryDraft::default()
        };
        draft.metrics.insert("spend".to_string(), spend);
        let now = NaiveDate::from_ymd_opt(2026, 4, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        draft.into_record(&catalog(), now).unwrap()
    }

    fn seeded(rows: usize) -> Table {
        let mut table = Table::default();
        for index in 0..rows {
            table.append(record("ATI", &format!("seed {index}"), 1.0).to_row());
        }
        table
    }

    fn reconciler(store: &Arc<MemoryStore>, ttl: Duration, mode: WriteMode) -> Reconciler {
        Reconciler::new(store.clone(), ttl, mode)
    }

    #[tokio::test]
    async fn submission_appends_one_row_at_the_end() {
        let store = Arc::new(MemoryStore::with_table(seeded(3)));
        let reconciler = reconciler(&store, Duration::from_secs(5), WriteMode::Optimistic);
        let entry = record("Thrive", "Jane", 100.0);

        let outcome = reconciler.submit(&entry).await.unwrap();

        let table = store.table().await;
        assert_eq!(outcome.rows, 4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.cell(3, "Company"), Some("Thrive"));
        assert_eq!(table.cell(3, "Entered By"), Some("Jane"));
        assert_eq!(table.cell(3, "Spend"), Some("100.00"));

        let expected: Vec<String> = entry.to_row().into_iter().map(|(_, cell)| cell).collect();
        assert_eq!(table.last().unwrap(), expected.as_slice());
        assert_eq!(outcome.version, Version::of(&table));
    }

    #[tokio::test]
    async fn empty_submitter_does_no_io() {
        let store = Arc::new(MemoryStore::with_table(seeded(2)));
        let reconciler = reconciler(&store, Duration::from_secs(5), WriteMode::Optimistic);
        let mut entry = record("Thrive", "Jane", 5.0);
        entry.entered_by.clear();

        let err = reconciler.submit(&entry).await.unwrap_err();

        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::MissingSubmitter)
        ));
        assert_eq!(store.reads(), 0);
        assert_eq!(store.writes(), 0);
        assert_eq!(store.table().await, seeded(2));
    }

    #[tokio::test]
    async fn failed_read_persists_a_single_row_table() {
        let store = Arc::new(MemoryStore::with_table(seeded(3)));
        store.fail_reads(true);
        let reconciler = reconciler(&store, Duration::from_secs(5), WriteMode::LastWriteWins);

        let outcome = reconciler.submit(&record("ATI", "Sam", 2.0)).await.unwrap();

        assert_eq!(outcome.rows, 1);
        let table = store.table().await;
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "Entered By"), Some("Sam"));
    }

    #[tokio::test]
    async fn failed_read_on_a_populated_store_conflicts_when_optimistic() {
        let store = Arc::new(MemoryStore::with_table(seeded(3)));
        store.fail_reads(true);
        let reconciler = reconciler(&store, Duration::from_secs(5), WriteMode::Optimistic);

        let err = reconciler.submit(&record("ATI", "Sam", 2.0)).await.unwrap_err();

        assert!(matches!(err, SubmitError::Conflict));
        assert_eq!(store.table().await, seeded(3));
    }

    #[tokio::test]
    async fn failed_read_on_an_empty_store_succeeds_when_optimistic() {
        let store = Arc::new(MemoryStore::default());
        store.fail_reads(true);
        let reconciler = reconciler(&store, Duration::from_secs(5), WriteMode::Optimistic);

        reconciler.submit(&record("ATI", "Sam", 2.0)).await.unwrap();
        assert_eq!(store.table().await.len(), 1);
    }

    #[tokio::test]
    async fn racing_writers_last_write_wins() {
        let store = Arc::new(MemoryStore::with_table(seeded(1)));
        let first = reconciler(&store, Duration::from_secs(60), WriteMode::LastWriteWins);
        let second = reconciler(&store, Duration::from_secs(60), WriteMode::LastWriteWins);

        // Both writers have read the one-row table before either writes.
        first.current_table().await.unwrap();
        second.current_table().await.unwrap();

        second.submit(&record("Thrive", "Ben", 1.0)).await.unwrap();
        first.submit(&record("ATI", "Ana", 1.0)).await.unwrap();

        let table = store.table().await;
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "Entered By"), Some("Ana"));
        assert!((0..table.len()).all(|row| table.cell(row, "Entered By") != Some("Ben")));
    }

    #[tokio::test]
    async fn racing_writers_conflict_when_optimistic() {
        let store = Arc::new(MemoryStore::with_table(seeded(1)));
        let first = reconciler(&store, Duration::from_secs(60), WriteMode::Optimistic);
        let second = reconciler(&store, Duration::from_secs(60), WriteMode::Optimistic);

        first.current_table().await.unwrap();
        second.current_table().await.unwrap();

        second.submit(&record("Thrive", "Ben", 1.0)).await.unwrap();
        let err = first.submit(&record("ATI", "Ana", 1.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Conflict));

        // The conflict dropped the stale cache, so a retry lands.
        first.submit(&record("ATI", "Ana", 1.0)).await.unwrap();
        let table = store.table().await;
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(1, "Entered By"), Some("Ben"));
        assert_eq!(table.cell(2, "Entered By"), Some("Ana"));
    }

    #[tokio::test]
    async fn success_invalidates_the_read_cache() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = reconciler(&store, Duration::from_secs(60), WriteMode::Optimistic);

        assert!(reconciler.current_table().await.unwrap().is_empty());
        reconciler.submit(&record("Thrive", "Jane", 1.0)).await.unwrap();
        assert_eq!(reconciler.current_table().await.unwrap().len(), 1);
    }

    #[test]
    fn write_mode_parses_both_spellings() {
        assert_eq!("optimistic".parse::<WriteMode>(), Ok(WriteMode::Optimistic));
        assert_eq!(
            "Last-Write-Wins".parse::<WriteMode>(),
            Ok(WriteMode::LastWriteWins)
        );
        assert!("sometimes".parse::<WriteMode>().is_err());
    }
}
