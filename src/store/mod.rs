//! Spreadsheet backends the reconciler reads from and rewrites.
//!
//! Every backend stores the whole table as one unit: `read` returns all of
//! it, `write` replaces all of it. A write may carry the [`Version`] the
//! caller last saw so that a concurrent writer is detected instead of
//! silently overwritten.

mod csv_file;
mod memory;
mod sheets;

pub use self::csv_file::CsvStore;
pub use self::memory::MemoryStore;
pub use self::sheets::{GoogleSheetsStore, SheetsSettings};

use crate::table::Table;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Content fingerprint of a table as it sat in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn of(table: &Table) -> Self {
        Self(table.fingerprint())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: Table,
    pub version: Version,
}

impl Snapshot {
    pub fn new(table: Table) -> Self {
        let version = Version::of(&table);
        Self { table, version }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Overwrite whatever the store holds.
    Unconditional,
    /// Overwrite only if the store still holds this version.
    IfVersion(Version),
}

impl WriteCondition {
    fn check(&self, current: &Version) -> Result<(), StoreError> {
        match self {
            Self::Unconditional => Ok(()),
            Self::IfVersion(expected) if expected == current => Ok(()),
            Self::IfVersion(_) => Err(StoreError::Conflict),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("the table changed since it was read")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn read(&self) -> Result<Snapshot, StoreError>;

    /// Replaces the stored table with `table` and returns the new version.
    async fn write(&self, table: &Table, condition: WriteCondition)
    -> Result<Version, StoreError>;
}
