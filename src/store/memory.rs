use super::{Snapshot, StoreError, TableStore, Version, WriteCondition};
use crate::table::Table;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Process-local table. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
    fail_reads: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn with_table(table: Table) -> Self {
        Self {
            table: Mutex::new(table),
            ..Self::default()
        }
    }

    /// Makes every subsequent `read` fail while writes keep working.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn table(&self) -> Table {
        self.table.lock().await.clone()
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn read(&self) -> Result<Snapshot, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("worksheet not found".to_string()));
        }
        Ok(Snapshot::new(self.table.lock().await.clone()))
    }

    async fn write(
        &self,
        table: &Table,
        condition: WriteCondition,
    ) -> Result<Version, StoreError> {
        let mut stored = self.table.lock().await;
        condition.check(&Version::of(&stored))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        *stored = table.clone();
        Ok(Version::of(table))
    }
}
