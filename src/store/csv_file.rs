use super::{Snapshot, StoreError, TableStore, Version, WriteCondition};
use crate::table::Table;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::error;

/// Whole-file CSV table. A missing file is an empty table.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Table, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Table::default()),
            Err(err) => {
                error!("failed to read data file {}: {err}", self.path.display());
                return Err(err.into());
            }
        };
        decode(&bytes)
    }
}

fn decode(bytes: &[u8]) -> Result<Table, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table::from_grid(grid))
}

fn encode(table: &Table) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in table.to_grid() {
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|err| StoreError::Io(err.into_error()))
}

#[async_trait]
impl TableStore for CsvStore {
    fn backend_tag(&self) -> &'static str {
        "csv"
    }

    async fn read(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::new(self.load().await?))
    }

    async fn write(
        &self,
        table: &Table,
        condition: WriteCondition,
    ) -> Result<Version, StoreError> {
        let _guard = self.write_lock.lock().await;
        if condition != WriteCondition::Unconditional {
            let current = Version::of(&self.load().await?);
            condition.check(&current)?;
        }

        let payload = encode(table)?;
        fs::write(&self.path, payload).await?;
        Ok(Version::of(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::default();
        table.append([("Company", "ATI"), ("Notes", "comma, quoted \"text\"")]);
        table.append([("Company", "Thrive"), ("Notes", "")]);
        table
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("absent.csv"));

        let snapshot = store.read().await.unwrap();
        assert!(snapshot.table.is_empty());
        assert_eq!(snapshot.version, Version::of(&Table::default()));
    }

    #[tokio::test]
    async fn write_then_read_preserves_cells() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("entries.csv"));
        let table = sample();

        let version = store
            .write(&table, WriteCondition::Unconditional)
            .await
            .unwrap();
        let snapshot = store.read().await.unwrap();

        assert_eq!(snapshot.table, table);
        assert_eq!(snapshot.version, version);
    }

    #[tokio::test]
    async fn stale_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("entries.csv"));
        let stale = store.read().await.unwrap().version;

        store
            .write(&sample(), WriteCondition::Unconditional)
            .await
            .unwrap();

        let err = store
            .write(&Table::default(), WriteCondition::IfVersion(stale))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.read().await.unwrap().table, sample());
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        assert!(store.read().await.is_err());
    }
}
