//! Core indexing engine for daynote.
//! Records and tags live in directories that keep their date, id and name
//! indices consistent and publish changes synchronously.

pub mod arena;
pub mod config;
pub mod directory;
pub mod logging;
pub mod model;
pub mod observe;
pub mod page;
pub mod service;
pub mod storage;

pub use config::{ConfigError, CoreConfig};
pub use directory::{
    DirectoryError, DirectoryResult, NameChange, RecordEvent, RecordSet, RecordSetEvent,
    RecordsDirectory, RecordsDirectoryEvent, TagEvent, TagsDirectory, TagsDirectoryEvent,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{PartitionKey, Record, RecordHandle};
pub use model::tag::{color_for_name, Tag, TagColor, TagHandle};
pub use observe::SubscriptionId;
pub use page::{PageCoordinator, PageError, PageEvent, PageRange};
pub use service::tag_policy::{
    assign_tag_names, normalize_tag_name, rename_tag, resolve_tag, RenameOutcome, TagPolicyError,
};
pub use storage::{
    capture_page, load_page, PageSnapshot, PageStorage, RecordSnapshot, SampleStorage,
    StorageError, StorageResult, TagSnapshot,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
