//! Storage collaborator contract consumed by the page coordinator.
//!
//! # Responsibility
//! - Define what a persistence backend must offer: populate a page, persist
//!   one record, delete one record.
//! - Provide serde snapshots for bulk load/save through the directories'
//!   own creation APIs.
//!
//! # Invariants
//! - Backends populate directories only via public directory operations, so
//!   every index stays consistent during bulk load.
//! - No file or wire format is fixed here; snapshots are plain serde values.

use crate::directory::{DirectoryError, RecordsDirectory, TagsDirectory};
use crate::model::record::RecordHandle;
use crate::page::PageRange;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sample;
pub mod snapshot;

pub use sample::SampleStorage;
pub use snapshot::{capture_page, load_page, PageSnapshot, RecordSnapshot, TagSnapshot};

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend could not serve the request.
    Unavailable(String),
    /// Directory rejected an operation during load or capture.
    Directory(DirectoryError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::Directory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DirectoryError> for StorageError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// Persistence backend for pages of records.
pub trait PageStorage {
    /// Populates `records`/`tags` with everything stored for `range`.
    fn read_page(
        &mut self,
        range: PageRange,
        records: &RecordsDirectory,
        tags: &TagsDirectory,
    ) -> StorageResult<()>;

    /// Persists the current state of one record.
    fn save_record(
        &mut self,
        records: &RecordsDirectory,
        tags: &TagsDirectory,
        record: RecordHandle,
    ) -> StorageResult<()>;

    /// Deletes one record from persistent storage.
    fn remove_record(
        &mut self,
        records: &RecordsDirectory,
        record: RecordHandle,
    ) -> StorageResult<()>;
}
