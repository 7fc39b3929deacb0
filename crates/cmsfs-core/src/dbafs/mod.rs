//! File index synchronization.
//!
//! Paths under the upload directory are mirrored into an index of
//! [`DbafsRecord`]s so that content can reference files by a stable uuid.
//! [`crate::File`] keeps the index current through the [`Dbafs`] trait;
//! [`JsonDbafs`] is the bundled implementation and [`NoDbafs`] disables
//! synchronization entirely.

pub mod json;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub use json::JsonDbafs;

/// Whether a record describes a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Folder,
}

/// One indexed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbafsRecord {
    pub uuid: String,
    /// Uuid of the parent folder record; `None` directly below the upload path.
    pub pid: Option<String>,
    pub tstamp: u64,
    pub kind: ResourceKind,
    pub path: String,
    pub name: String,
    pub extension: String,
    pub hash: String,
}

/// Index operations a file handle relies on. Paths are relative and use
/// forward slashes.
pub trait Dbafs: Send + Sync {
    /// `true` if `path` falls under the synchronization policy.
    fn should_be_synchronized(&self, path: &str) -> bool;

    /// Creates or refreshes the record for `path` (and missing parent folders).
    fn add_resource(&self, path: &str) -> CoreResult<DbafsRecord>;

    /// Removes the record for `path` and everything below it.
    fn delete_resource(&self, path: &str) -> CoreResult<()>;

    /// Re-keys the record (and descendants) from `from` to `to`, keeping uuids.
    fn move_resource(&self, from: &str, to: &str) -> CoreResult<DbafsRecord>;

    /// Duplicates the record (and descendants) at `to` under fresh uuids.
    fn copy_resource(&self, from: &str, to: &str) -> CoreResult<DbafsRecord>;

    fn find_by_path(&self, path: &str) -> CoreResult<Option<DbafsRecord>>;
}

/// A [`Dbafs`] that never synchronizes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDbafs;

impl Dbafs for NoDbafs {
    fn should_be_synchronized(&self, _path: &str) -> bool {
        false
    }

    fn add_resource(&self, _path: &str) -> CoreResult<DbafsRecord> {
        Err(disabled())
    }

    fn delete_resource(&self, _path: &str) -> CoreResult<()> {
        Err(disabled())
    }

    fn move_resource(&self, _from: &str, _to: &str) -> CoreResult<DbafsRecord> {
        Err(disabled())
    }

    fn copy_resource(&self, _from: &str, _to: &str) -> CoreResult<DbafsRecord> {
        Err(disabled())
    }

    fn find_by_path(&self, _path: &str) -> CoreResult<Option<DbafsRecord>> {
        Ok(None)
    }
}

fn disabled() -> CoreError {
    CoreError::Sync("synchronization is disabled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dbafs_never_synchronizes() {
        assert!(!NoDbafs.should_be_synchronized("files/a.txt"));
        assert!(NoDbafs.find_by_path("files/a.txt").unwrap().is_none());
        assert!(matches!(
            NoDbafs.add_resource("files/a.txt").unwrap_err(),
            CoreError::Sync(_)
        ));
    }

    #[test]
    fn resource_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ResourceKind::Folder).unwrap(), "\"folder\"");
    }
}
