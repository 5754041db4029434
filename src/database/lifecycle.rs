use parking_lot::RwLock;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DatabaseId, ObjectId};
use crate::database::attributes::{AttributeChange, DatabaseAttributes};
use crate::database::cache::{CachedObject, DatabaseCache};
use crate::database::paths::{DatabasePaths, PathCategory, PathRegistry};
use crate::database::sequence::ObjectIdSequence;
use crate::external::txn::{LogCategory, Transaction};

/// The twelve system tables every database carries (spec §4.9.2), created
/// in this order and undone in reverse on any failure.
const SYSTEM_TABLES: &[&str] = &[
    "Area",
    "AreaContent",
    "Table",
    "Column",
    "Constraint",
    "Index",
    "Key",
    "File",
    "Field",
    "Function",
    "Privilege",
    "Cascade",
    "Partition",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Created,
    Persistent,
    Mounted,
    Unmounted,
    Dropped,
}

pub struct Database {
    pub id: DatabaseId,
    pub name: String,
    pub paths: DatabasePaths,
    pub attributes: RwLock<DatabaseAttributes>,
    pub cache: DatabaseCache,
    status: RwLock<DatabaseStatus>,
    object_ids: RwLock<Option<ObjectIdSequence>>,
}

impl Database {
    pub fn new(id: DatabaseId, name: impl Into<String>, paths: DatabasePaths) -> Self {
        Database {
            id,
            name: name.into(),
            paths,
            attributes: RwLock::new(DatabaseAttributes::default()),
            cache: DatabaseCache::new(),
            status: RwLock::new(DatabaseStatus::Created),
            object_ids: RwLock::new(None),
        }
    }

    pub fn status(&self) -> DatabaseStatus {
        *self.status.read()
    }

    /// `CREATE DATABASE` (spec §4.9.2, §3.1): reserves the resolved paths,
    /// creates the object-id sequence, builds the system tables and the
    /// logical log, then mounts. Any step that fails unwinds everything
    /// created so far in reverse order; if the unwind itself fails the
    /// path reservation is deliberately left in place rather than risk a
    /// half-reserved, half-released registry.
    pub fn create(&self, tx: &mut dyn Transaction, registry: &PathRegistry) -> Result<()> {
        registry.reserve(self.id, &self.paths, false)?;

        if let Err(e) = self.create_object_id_sequence() {
            registry.release(&self.paths);
            return Err(e);
        }

        let mut built: Vec<(&str, ObjectId)> = Vec::new();
        for table in SYSTEM_TABLES {
            let result = {
                let mut guard = self.object_ids.write();
                let sequence = guard.as_mut().expect("object id sequence created above");
                create_system_table(tx, &self.cache, sequence, table)
            };
            match result {
                Ok(object_id) => built.push((table, object_id)),
                Err(e) => {
                    if let Err(undo_err) = undo_created_tables(tx, &self.cache, &built) {
                        return Err(Error::new(
                            ErrorKind::Internal,
                            format!("create failed ({e}) and undo failed ({undo_err}); database left in inconsistent state"),
                        ));
                    }
                    registry.release(&self.paths);
                    return Err(e);
                }
            }
        }

        if let Err(e) = tx.create_log(LogCategory::Database) {
            if let Err(undo_err) = undo_created_tables(tx, &self.cache, &built) {
                return Err(Error::new(
                    ErrorKind::Internal,
                    format!("create failed ({e}) and undo failed ({undo_err}); database left in inconsistent state"),
                ));
            }
            registry.release(&self.paths);
            return Err(e);
        }

        *self.status.write() = DatabaseStatus::Persistent;
        self.mount(tx)
    }

    fn create_object_id_sequence(&self) -> Result<()> {
        let seq_path = sequence_path(&self.paths).ok_or_else(|| {
            Error::new(ErrorKind::InvalidPath, "database has no path to host its object-id sequence".to_string())
        })?;
        if let Some(parent) = seq_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sequence = ObjectIdSequence::create(&seq_path)?;
        *self.object_ids.write() = Some(sequence);
        Ok(())
    }

    /// Idempotent: mounting an already-mounted database is a no-op.
    pub fn mount(&self, tx: &mut dyn Transaction) -> Result<()> {
        if self.status() == DatabaseStatus::Mounted {
            return Ok(());
        }
        tx.mount_log(LogCategory::Database)?;
        self.cache.acquire();
        self.attributes.write().alter(AttributeChange::Online(true))?;
        *self.status.write() = DatabaseStatus::Mounted;
        Ok(())
    }

    /// Idempotent: unmounting an already-unmounted database is a no-op.
    pub fn unmount(&self, tx: &mut dyn Transaction) -> Result<()> {
        if self.status() != DatabaseStatus::Mounted {
            return Ok(());
        }
        tx.unmount_log(LogCategory::Database)?;
        self.cache.release();
        self.attributes.write().alter(AttributeChange::Online(false))?;
        *self.status.write() = DatabaseStatus::Unmounted;
        Ok(())
    }

    /// `ALTER DATABASE ... MOVE` (spec §4.9.3): diffs the three path
    /// categories, reserves only the ones that actually changed, then
    /// physically relocates each changed path's backing files with the
    /// same rename primitive `MainFile::rename` uses. Any sub-move already
    /// applied is rolled back in reverse on a later failure.
    pub fn move_paths(&mut self, registry: &PathRegistry, new_paths: DatabasePaths) -> Result<()> {
        let old_paths = self.paths.clone();
        let mut changed: Vec<PathCategory> = Vec::new();
        for category in [PathCategory::Data, PathCategory::LogicalLog, PathCategory::System] {
            if old_paths.get(category) != new_paths.get(category) {
                changed.push(category);
            }
        }
        if changed.is_empty() {
            return Ok(());
        }

        let target_paths = subset(&new_paths, &changed);
        registry.reserve(self.id, &target_paths, false).map_err(|e| {
            Error::new(ErrorKind::InvalidPath, format!("move target overlaps an existing reservation: {e}"))
        })?;

        let mut relocated: Vec<(std::path::PathBuf, std::path::PathBuf)> = Vec::new();
        for &category in &changed {
            if let (Some(from), Some(to)) = (old_paths.get(category), new_paths.get(category)) {
                if let Err(e) = relocate_backing_path(from, to) {
                    for (moved_from, moved_to) in relocated.iter().rev() {
                        let _ = relocate_backing_path(moved_to, moved_from);
                    }
                    registry.release(&target_paths);
                    return Err(e);
                }
                relocated.push((from.clone(), to.clone()));
            }
        }

        self.paths = new_paths;
        registry.release(&subset(&old_paths, &changed));
        Ok(())
    }

    /// `BACKUP DATABASE` (spec §1): flushes and copies every resolved path
    /// category into `destination`, mirroring the same relative layout so
    /// `recover` can restore from it without translation.
    pub fn backup(&self, destination: &std::path::Path) -> Result<()> {
        self.cache.acquire();
        let result = (|| {
            for category in [PathCategory::Data, PathCategory::LogicalLog, PathCategory::System] {
                if let Some(path) = self.paths.get(category) {
                    if path.exists() {
                        copy_tree(path, &destination.join(category_dirname(category)))?;
                    }
                }
            }
            Ok(())
        })();
        self.cache.release();
        result
    }

    /// `RECOVER DATABASE` (spec §1): the inverse of `backup` - restores
    /// every category present under `source` back onto this database's
    /// currently resolved paths. The database must be unmounted first so
    /// no reader observes a half-restored tree.
    pub fn recover(&self, tx: &mut dyn Transaction, source: &std::path::Path) -> Result<()> {
        if self.status() == DatabaseStatus::Mounted {
            return Err(Error::new(ErrorKind::InvalidState, "recover requires an unmounted database".to_string()));
        }
        for category in [PathCategory::Data, PathCategory::LogicalLog, PathCategory::System] {
            let backup_dir = source.join(category_dirname(category));
            if let Some(path) = self.paths.get(category) {
                if backup_dir.exists() {
                    copy_tree(&backup_dir, path)?;
                }
            }
        }
        self.mount(tx)
    }

    /// `DROP DATABASE` (spec §4.9.4): if the database was ever persisted,
    /// destruction is deferred to the next checkpoint via `destroyer`; if
    /// it never made it past `Created`, there is nothing durable to defer
    /// and paths are released immediately.
    pub fn drop_database(
        &self,
        tx: &mut dyn Transaction,
        registry: &PathRegistry,
        destroyer: &crate::checkpoint::FileDestroyer,
        transaction_id: u64,
    ) -> Result<()> {
        self.unmount(tx)?;
        match self.status() {
            DatabaseStatus::Created => {
                registry.release(&self.paths);
            }
            _ => {
                if let Some(path) = self.paths.get(PathCategory::LogicalLog) {
                    destroyer.enter(transaction_id, crate::checkpoint::DestroyKind::LogicalLog, path.clone());
                }
                if let Some(path) = self.paths.get(PathCategory::Data) {
                    destroyer.enter(transaction_id, crate::checkpoint::DestroyKind::Directory, path.clone());
                }
                tx.destroy_log(LogCategory::Database)?;
                registry.release(&self.paths);
            }
        }
        *self.status.write() = DatabaseStatus::Dropped;
        Ok(())
    }

    /// `ALTER DATABASE ... SET ...` (spec §4.9.5). Entering or leaving
    /// super-user mode is routed through the process-wide registry so a
    /// second session's DDL attempt is rejected while it's held.
    pub fn alter(
        &self,
        change: AttributeChange,
        super_user: &crate::registry::SuperUserRegistry,
    ) -> Result<()> {
        super_user.check_ddl_allowed(self.id)?;
        if matches!(change, AttributeChange::SuperUserMode(true)) {
            super_user.enter(self.id)?;
        }
        if let Err(e) = self.attributes.write().alter(change.clone()) {
            if matches!(change, AttributeChange::SuperUserMode(true)) {
                super_user.exit(self.id);
            }
            return Err(e);
        }
        if matches!(change, AttributeChange::SuperUserMode(false)) {
            super_user.exit(self.id);
        }
        Ok(())
    }
}

fn sequence_path(paths: &DatabasePaths) -> Option<std::path::PathBuf> {
    paths.get(PathCategory::System).or_else(|| paths.get(PathCategory::Data)).map(|base| base.join("objid.seq"))
}

fn category_dirname(category: PathCategory) -> &'static str {
    match category {
        PathCategory::Data => "data",
        PathCategory::LogicalLog => "logical_log",
        PathCategory::System => "system",
    }
}

fn subset(paths: &DatabasePaths, categories: &[PathCategory]) -> DatabasePaths {
    let mut out = DatabasePaths::default();
    for &category in categories {
        match category {
            PathCategory::Data => out.data = paths.data.clone(),
            PathCategory::LogicalLog => out.logical_log = paths.logical_log.clone(),
            PathCategory::System => out.system = paths.system.clone(),
        }
    }
    out
}

/// Relocates a data/log/system path on disk, falling back to copy-then-
/// remove when `from` and `to` sit on different filesystems (`EXDEV`).
fn relocate_backing_path(from: &std::path::Path, to: &std::path::Path) -> Result<()> {
    if !from.exists() {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = std::fs::rename(from, to) {
        if e.raw_os_error() == Some(libc::EXDEV) {
            copy_tree(from, to)?;
            if from.is_dir() {
                std::fs::remove_dir_all(from)?;
            } else {
                std::fs::remove_file(from)?;
            }
        } else {
            return Err(e.into());
        }
    }
    Ok(())
}

fn copy_tree(from: &std::path::Path, to: &std::path::Path) -> Result<()> {
    if from.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
    }
    Ok(())
}

fn table_exists(cache: &DatabaseCache, name: &str) -> bool {
    cache.tables.read().values().any(|c| c.serialized == name.as_bytes())
}

/// Allocates an object id and registers the table's catalog row in the
/// schema cache (spec §4.9.2, §4.9.7). Fails with `DatabaseAlreadyDefined`
/// if a row for this name is already cached, which is exactly what makes
/// `undo_created_tables` reachable: a name collision partway through
/// `SYSTEM_TABLES` leaves `built` non-empty and triggers the reverse-order
/// undo below.
fn create_system_table(
    tx: &mut dyn Transaction,
    cache: &DatabaseCache,
    sequence: &mut ObjectIdSequence,
    name: &str,
) -> Result<ObjectId> {
    if table_exists(cache, name) {
        return Err(Error::new(ErrorKind::DatabaseAlreadyDefined, format!("system table {name} already exists")));
    }
    let object_id = sequence.next_id()?;
    tx.begin_batch_insert()?;
    cache.tables.write().insert(object_id, CachedObject { object_id, serialized: name.as_bytes().to_vec() });
    tx.end_batch_insert()?;
    Ok(object_id)
}

fn undo_created_tables(tx: &mut dyn Transaction, cache: &DatabaseCache, built: &[(&str, ObjectId)]) -> Result<()> {
    for (name, object_id) in built.iter().rev() {
        destroy_system_table(tx, cache, *object_id, name)?;
    }
    Ok(())
}

fn destroy_system_table(tx: &mut dyn Transaction, cache: &DatabaseCache, object_id: ObjectId, _name: &str) -> Result<()> {
    tx.begin_batch_insert()?;
    cache.tables.write().remove(&object_id);
    tx.end_batch_insert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct NoopTransaction;

    impl Transaction for NoopTransaction {
        fn begin_batch_insert(&mut self) -> Result<()> {
            Ok(())
        }
        fn end_batch_insert(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_canceled_statement(&self) -> bool {
            false
        }
        fn is_no_lock(&self) -> bool {
            false
        }
        fn get_log(&self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn mount_log(&mut self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn unmount_log(&mut self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn flush_log(&mut self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn rename_log(&mut self, _category: LogCategory, _new_name: &str) -> Result<()> {
            Ok(())
        }
        fn destroy_log(&mut self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn create_log(&mut self, _category: LogCategory) -> Result<()> {
            Ok(())
        }
        fn set_log(&mut self, _database_id: DatabaseId) -> Result<()> {
            Ok(())
        }
    }

    fn paths(tag: &str) -> DatabasePaths {
        DatabasePaths {
            data: Some(PathBuf::from(format!("/tmp/{tag}/data"))),
            logical_log: Some(PathBuf::from(format!("/tmp/{tag}/log"))),
            system: None,
        }
    }

    #[test]
    fn create_mounts_and_reserves_paths() {
        let registry = PathRegistry::new();
        let mut tx = NoopTransaction;
        let db = Database::new(DatabaseId(1), "db1", paths("db1"));
        db.create(&mut tx, &registry).unwrap();
        assert_eq!(db.status(), DatabaseStatus::Mounted);
        assert!(registry.is_reserved(db.paths.get(PathCategory::Data).unwrap()));
    }

    #[test]
    fn drop_after_create_defers_destruction() {
        let registry = PathRegistry::new();
        let destroyer = crate::checkpoint::FileDestroyer::new();
        let mut tx = NoopTransaction;
        let db = Database::new(DatabaseId(2), "db2", paths("db2"));
        db.create(&mut tx, &registry).unwrap();
        db.drop_database(&mut tx, &registry, &destroyer, 7).unwrap();
        assert_eq!(db.status(), DatabaseStatus::Dropped);
        assert_eq!(destroyer.pending_count(), 2);
        assert!(!registry.is_reserved(db.paths.get(PathCategory::Data).unwrap()));
    }

    #[test]
    fn create_fails_and_undoes_on_table_name_collision() {
        let registry = PathRegistry::new();
        let mut tx = NoopTransaction;
        let db = Database::new(DatabaseId(10), "db10", paths("db10"));

        // Pre-populate the cache with a catalog row for "Index" so
        // create()'s loop collides partway through SYSTEM_TABLES.
        db.cache.tables.write().insert(ObjectId(999), CachedObject { object_id: ObjectId(999), serialized: b"Index".to_vec() });

        let err = db.create(&mut tx, &registry).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DatabaseAlreadyDefined);

        // Everything created before the collision ("Area".."Constraint")
        // was undone; the pre-existing "Index" row survives untouched.
        assert!(!table_exists(&db.cache, "Area"));
        assert!(!table_exists(&db.cache, "Constraint"));
        assert!(table_exists(&db.cache, "Index"));
        assert!(!registry.is_reserved(db.paths.get(PathCategory::Data).unwrap()));
    }

    #[test]
    fn backup_then_recover_restores_files() {
        let registry = PathRegistry::new();
        let mut tx = NoopTransaction;
        let db = Database::new(DatabaseId(11), "db11", paths("db11"));
        db.create(&mut tx, &registry).unwrap();
        db.unmount(&mut tx).unwrap();

        let backup_dir = tempfile::tempdir().unwrap();
        db.backup(backup_dir.path()).unwrap();

        let data_dir = db.paths.get(PathCategory::Data).unwrap().clone();
        std::fs::remove_file(data_dir.join("objid.seq")).unwrap();
        assert!(!data_dir.join("objid.seq").exists());

        db.recover(&mut tx, backup_dir.path()).unwrap();
        assert!(data_dir.join("objid.seq").exists());
        assert_eq!(db.status(), DatabaseStatus::Mounted);
    }

    #[test]
    fn super_user_mode_blocks_second_holder() {
        let super_user = crate::registry::SuperUserRegistry::new();
        let db = Database::new(DatabaseId(3), "db3", paths("db3"));
        db.alter(AttributeChange::SuperUserMode(true), &super_user).unwrap();
        assert!(db.attributes.read().super_user_mode());
        assert!(super_user.is_held(DatabaseId(3)));
    }

    #[test]
    fn move_paths_relocates_backing_files_on_disk() {
        let registry = PathRegistry::new();
        let mut tx = NoopTransaction;
        let mut db = Database::new(DatabaseId(12), "db12", paths("db12"));
        db.create(&mut tx, &registry).unwrap();

        let old_data = db.paths.get(PathCategory::Data).unwrap().clone();
        assert!(old_data.join("objid.seq").exists());

        let new_root = tempfile::tempdir().unwrap();
        let new_data = new_root.path().join("moved-data");
        let new_paths = DatabasePaths { data: Some(new_data.clone()), ..db.paths.clone() };
        db.move_paths(&registry, new_paths).unwrap();

        assert!(!old_data.exists());
        assert!(new_data.join("objid.seq").exists());
    }

    #[test]
    fn move_paths_rejects_overlap_with_another_database() {
        let registry = PathRegistry::new();
        let other = Database::new(DatabaseId(5), "other", paths("other"));
        registry.reserve(other.id, &other.paths, false).unwrap();

        let mut tx = NoopTransaction;
        let mut db = Database::new(DatabaseId(4), "db4", paths("db4"));
        db.create(&mut tx, &registry).unwrap();

        let err = db.move_paths(&registry, other.paths.clone()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPath);
    }
}
