use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DatabaseId;

/// The three path categories a database definition resolves (spec §4.9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCategory {
    Data,
    LogicalLog,
    System,
}

#[derive(Debug, Clone, Default)]
pub struct DatabasePaths {
    pub data: Option<PathBuf>,
    pub logical_log: Option<PathBuf>,
    pub system: Option<PathBuf>,
}

impl DatabasePaths {
    /// An empty entry in the definition means "use the default" - the
    /// server-config path for that category.
    pub fn resolve(&self, defaults: &DatabasePaths) -> DatabasePaths {
        DatabasePaths {
            data: self.data.clone().or_else(|| defaults.data.clone()),
            logical_log: self.logical_log.clone().or_else(|| defaults.logical_log.clone()),
            system: self.system.clone().or_else(|| defaults.system.clone()),
        }
    }

    pub fn get(&self, category: PathCategory) -> Option<&PathBuf> {
        match category {
            PathCategory::Data => self.data.as_ref(),
            PathCategory::LogicalLog => self.logical_log.as_ref(),
            PathCategory::System => self.system.as_ref(),
        }
    }

    fn entries(&self) -> Vec<(PathCategory, &PathBuf)> {
        [
            (PathCategory::Data, self.data.as_ref()),
            (PathCategory::LogicalLog, self.logical_log.as_ref()),
            (PathCategory::System, self.system.as_ref()),
        ]
        .into_iter()
        .filter_map(|(c, p)| p.map(|p| (c, p)))
        .collect()
    }
}

/// Process-wide registry of reserved paths, indexing both database paths
/// and area paths under one namespace so overlapping reservations are
/// caught regardless of owner (spec §4.9.1).
#[derive(Default)]
pub struct PathRegistry {
    reserved: Mutex<HashMap<PathBuf, DatabaseId>>,
}

impl PathRegistry {
    pub fn new() -> Self {
        PathRegistry { reserved: Mutex::new(HashMap::new()) }
    }

    /// Reserves every resolved path for `database_id`. Any overlap with an
    /// existing reservation fails with `InvalidPath` unless
    /// `allow_existence` is set (the crash-recovery redo path). Overlap
    /// means equal *or nested* - `/srv/a/sub` clashes with an existing
    /// `/srv/a` reservation even though neither path is the other's exact
    /// key (spec §8.5 S5).
    pub fn reserve(&self, database_id: DatabaseId, paths: &DatabasePaths, allow_existence: bool) -> Result<()> {
        let mut reserved = self.reserved.lock();
        for (_, path) in paths.entries() {
            if let Some((existing, owner)) = find_overlap(&reserved, path) {
                if !(allow_existence && owner == database_id) {
                    return Err(Error::new(
                        ErrorKind::InvalidPath,
                        format!("path {} overlaps reserved path {}", path.display(), existing.display()),
                    ));
                }
            }
        }
        for (_, path) in paths.entries() {
            reserved.insert(path.clone(), database_id);
        }
        Ok(())
    }

    pub fn release(&self, paths: &DatabasePaths) {
        let mut reserved = self.reserved.lock();
        for (_, path) in paths.entries() {
            reserved.remove(path);
        }
    }

    pub fn is_reserved(&self, path: &Path) -> bool {
        find_overlap(&self.reserved.lock(), path).is_some()
    }
}

fn find_overlap<'a>(reserved: &'a HashMap<PathBuf, DatabaseId>, path: &Path) -> Option<(&'a Path, DatabaseId)> {
    reserved
        .iter()
        .find(|(existing, _)| existing.as_path() == path || existing.starts_with(path) || path.starts_with(existing))
        .map(|(existing, &owner)| (existing.as_path(), owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_reservation_is_invalid_path() {
        let registry = PathRegistry::new();
        let paths = DatabasePaths { data: Some(PathBuf::from("/tmp/db1/data")), ..Default::default() };
        registry.reserve(DatabaseId(1), &paths, false).unwrap();
        let err = registry.reserve(DatabaseId(2), &paths, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPath);
    }

    #[test]
    fn allow_existence_lets_the_same_owner_re_reserve() {
        let registry = PathRegistry::new();
        let paths = DatabasePaths { data: Some(PathBuf::from("/tmp/db1/data")), ..Default::default() };
        registry.reserve(DatabaseId(1), &paths, false).unwrap();
        assert!(registry.reserve(DatabaseId(1), &paths, true).is_ok());
    }

    /// §8.5 S5: `PATH '/srv/a'` then `PATH '/srv/a/sub'` - a strict
    /// sub-path, not an equal key - still clashes.
    #[test]
    fn nested_sub_path_clashes_with_parent_reservation() {
        let registry = PathRegistry::new();
        let parent = DatabasePaths { data: Some(PathBuf::from("/srv/a")), ..Default::default() };
        registry.reserve(DatabaseId(1), &parent, false).unwrap();

        let child = DatabasePaths { data: Some(PathBuf::from("/srv/a/sub")), ..Default::default() };
        let err = registry.reserve(DatabaseId(2), &child, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPath);
        assert!(!registry.is_reserved(&PathBuf::from("/srv/a/sub")));
    }
}
