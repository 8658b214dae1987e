// src/snapshot/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{DagrunError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::snapshot::{Snapshot, SnapshotStore};

/// Stores one pretty-printed JSON file per run id under a state directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(dir, Arc::new(RealFileSystem))
    }

    pub fn with_fs(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<run_id>.json`, after checking the id is a safe file name.
    pub fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

/// Run ids become file names: ASCII alphanumerics plus `-`, `_` and `.`,
/// not starting with a dot.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    let valid = !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(DagrunError::Snapshot(format!(
            "invalid run id '{run_id}': use letters, digits, '-', '_' or '.'"
        )))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(&snapshot.run_id)?;
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.fs.write(&path, &bytes)?;
        info!(
            run_id = %snapshot.run_id,
            path = %path.display(),
            pending = snapshot.pending.len(),
            failed = snapshot.failed.len(),
            "saved resume snapshot"
        );
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(run_id)?;
        if !self.fs.exists(&path) {
            debug!(run_id, path = %path.display(), "no resume snapshot");
            return Ok(None);
        }

        let text = self.fs.read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
            DagrunError::Snapshot(format!("reading '{}': {e}", path.display()))
        })?;

        if snapshot.run_id != run_id {
            return Err(DagrunError::Snapshot(format!(
                "'{}' belongs to run '{}', not '{run_id}'",
                path.display(),
                snapshot.run_id
            )));
        }
        Ok(Some(snapshot))
    }

    fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.path_for(run_id)?;
        self.fs.remove_file(&path)?;
        debug!(run_id, path = %path.display(), "removed resume snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::collections::BTreeSet;

    fn snapshot(run_id: &str) -> Snapshot {
        Snapshot {
            version: crate::snapshot::SNAPSHOT_VERSION,
            run_id: run_id.into(),
            pending: BTreeSet::new(),
            done: BTreeSet::new(),
            failed: ["crawl".to_string()].into_iter().collect(),
            tasks: Vec::new(),
        }
    }

    #[test]
    fn save_load_delete_through_filesystem() {
        let fs = MockFileSystem::new();
        let store = FileSnapshotStore::with_fs("state", Arc::new(fs.clone()));

        assert_eq!(store.load("nightly").unwrap(), None);

        store.save(&snapshot("nightly")).unwrap();
        assert_eq!(fs.paths(), [PathBuf::from("state/nightly.json")]);
        assert_eq!(store.load("nightly").unwrap(), Some(snapshot("nightly")));

        store.delete("nightly").unwrap();
        assert!(fs.paths().is_empty());
        store.delete("nightly").unwrap();
    }

    #[test]
    fn run_ids_must_be_plain_file_names() {
        for bad in ["", "../etc", "a/b", ".hidden", "sp ace"] {
            assert!(validate_run_id(bad).is_err(), "{bad:?} accepted");
        }
        for good in ["nightly", "2024-06-01", "run_7.retry"] {
            assert!(validate_run_id(good).is_ok(), "{good:?} rejected");
        }
    }

    #[test]
    fn corrupt_file_is_a_snapshot_error() {
        let fs = MockFileSystem::new();
        fs.add_file("state/r.json", "{ not json");
        let store = FileSnapshotStore::with_fs("state", Arc::new(fs));
        assert!(matches!(store.load("r"), Err(DagrunError::Snapshot(_))));
    }
}
