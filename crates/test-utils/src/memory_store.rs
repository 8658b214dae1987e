use std::collections::HashMap;
use std::sync::Mutex;

use dagrun::errors::Result;
use dagrun::snapshot::{Snapshot, SnapshotStore};

/// Snapshot store kept in memory, for runs that should not touch disk.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: &str) -> Option<Snapshot> {
        self.snapshots.lock().unwrap().get(run_id).cloned()
    }

    /// Number of `save` calls so far.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.saves.lock().unwrap() += 1;
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.run_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Option<Snapshot>> {
        Ok(self.get(run_id))
    }

    fn delete(&self, run_id: &str) -> Result<()> {
        self.snapshots.lock().unwrap().remove(run_id);
        Ok(())
    }
}
