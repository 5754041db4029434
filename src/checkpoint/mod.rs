use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::Mutex;

/// What a pending-destruction record refers to (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyKind {
    LogicalFile,
    Directory,
    LogicalLog,
}

#[derive(Debug, Clone)]
struct PendingDestruction {
    transaction_id: u64,
    kind: DestroyKind,
    path: PathBuf,
    registered_at_checkpoint: u64,
}

/// Process-wide registry of deferred destructions (spec §4.10). A file is
/// only physically removed one checkpoint after its schema-side deletion
/// was durably persisted, which is what makes the deferral crash-safe.
pub struct FileDestroyer {
    pending: Mutex<VecDeque<PendingDestruction>>,
    last_checkpoint: Mutex<u64>,
}

impl Default for FileDestroyer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDestroyer {
    pub fn new() -> Self {
        FileDestroyer { pending: Mutex::new(VecDeque::new()), last_checkpoint: Mutex::new(0) }
    }

    pub fn observe_checkpoint(&self, timestamp: u64) {
        *self.last_checkpoint.lock() = timestamp;
    }

    pub fn enter(&self, transaction_id: u64, kind: DestroyKind, path: PathBuf) {
        let registered_at_checkpoint = *self.last_checkpoint.lock();
        self.pending.lock().push_back(PendingDestruction { transaction_id, kind, path, registered_at_checkpoint });
    }

    /// Withdraws a pending record for `(transaction_id, path)` if it is
    /// still queued (spec §4.10's `erase`).
    pub fn erase(&self, transaction_id: u64, path: &std::path::Path) {
        self.pending.lock().retain(|r| !(r.transaction_id == transaction_id && r.path == path));
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Destroys every record whose registration checkpoint is strictly
    /// older than the most recent observed checkpoint, or unconditionally
    /// when `force` is set. Directories are destroyed last within this
    /// pass so their child files are gone first. A failed destruction is
    /// logged and the record kept; the remaining records still run.
    pub fn execute(&self, force: bool) -> Vec<(PathBuf, std::io::Error)> {
        let current_checkpoint = *self.last_checkpoint.lock();
        let mut pending = self.pending.lock();
        let mut due: Vec<PendingDestruction> = Vec::new();
        let mut kept = VecDeque::new();
        for record in pending.drain(..) {
            if force || record.registered_at_checkpoint < current_checkpoint {
                due.push(record);
            } else {
                kept.push_back(record);
            }
        }
        due.sort_by_key(|r| matches!(r.kind, DestroyKind::Directory));

        let mut failures = Vec::new();
        for record in due {
            let result = match record.kind {
                DestroyKind::LogicalFile | DestroyKind::LogicalLog => std::fs::remove_file(&record.path),
                DestroyKind::Directory => std::fs::remove_dir_all(&record.path),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    failures.push((record.path.clone(), e));
                    kept.push_back(record);
                }
            }
        }
        *pending = kept;
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_respects_checkpoint_boundary() {
        let destroyer = FileDestroyer::new();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.dat");
        std::fs::write(&file, b"x").unwrap();

        destroyer.enter(1, DestroyKind::LogicalFile, file.clone());
        destroyer.execute(false);
        assert!(file.exists());
        assert_eq!(destroyer.pending_count(), 1);

        destroyer.observe_checkpoint(1);
        destroyer.execute(false);
        assert!(!file.exists());
        assert_eq!(destroyer.pending_count(), 0);
    }

    #[test]
    fn erase_withdraws_a_pending_record() {
        let destroyer = FileDestroyer::new();
        let path = PathBuf::from("/tmp/never-created.dat");
        destroyer.enter(1, DestroyKind::LogicalFile, path.clone());
        destroyer.erase(1, &path);
        assert_eq!(destroyer.pending_count(), 0);
    }
}
