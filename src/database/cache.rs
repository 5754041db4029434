use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::core::types::ObjectId;

/// Per-kind schema object cache maintained while a database is mounted
/// (spec §4.9.7). `CacheMap` covers the remaining child-schema kinds
/// (constraint, key, field) that don't need their own typed map.
#[derive(Default)]
pub struct DatabaseCache {
    pub areas: RwLock<HashMap<ObjectId, CachedObject>>,
    pub tables: RwLock<HashMap<ObjectId, CachedObject>>,
    pub cascades: RwLock<HashMap<ObjectId, CachedObject>>,
    pub partitions: RwLock<HashMap<ObjectId, CachedObject>>,
    pub functions: RwLock<HashMap<ObjectId, CachedObject>>,
    pub privileges: RwLock<HashMap<ObjectId, CachedObject>>,
    pub general: RwLock<HashMap<ObjectId, CachedObject>>,
    refs: AtomicU32,
    frozen: RwLock<bool>,
}

#[derive(Debug, Clone)]
pub struct CachedObject {
    pub object_id: ObjectId,
    pub serialized: Vec<u8>,
}

/// Above this many cached entries (across every kind) a drop to zero refs
/// frees the cache immediately instead of deferring it.
const PROCESS_CACHE_LIMIT: usize = 10_000;

impl DatabaseCache {
    pub fn new() -> Self {
        DatabaseCache::default()
    }

    pub fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
        *self.frozen.write() = false;
    }

    /// Drops a reference. When the count reaches zero the cache is kept
    /// around (so the next mount is warm) unless the total entry count
    /// exceeds the process-wide cap, in which case it's cleared eagerly.
    pub fn release(&self) -> bool {
        let prev = self.refs.fetch_sub(1, Ordering::SeqCst);
        if prev != 1 {
            return false;
        }
        if self.len() > PROCESS_CACHE_LIMIT {
            self.clear();
            false
        } else {
            *self.frozen.write() = true;
            true
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn is_frozen(&self) -> bool {
        *self.frozen.read()
    }

    pub fn len(&self) -> usize {
        self.areas.read().len()
            + self.tables.read().len()
            + self.cascades.read().len()
            + self.partitions.read().len()
            + self.functions.read().len()
            + self.privileges.read().len()
            + self.general.read().len()
    }

    pub fn clear(&self) {
        self.areas.write().clear();
        self.tables.write().clear();
        self.cascades.write().clear();
        self.partitions.write().clear();
        self.functions.write().clear();
        self.privileges.write().clear();
        self.general.write().clear();
        *self.frozen.write() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_acquire_does_not_underflow_into_clear() {
        let cache = DatabaseCache::new();
        cache.acquire();
        assert!(cache.release());
        assert!(cache.is_frozen());
        assert_eq!(cache.ref_count(), 0);
    }

    #[test]
    fn acquire_after_release_unfreezes() {
        let cache = DatabaseCache::new();
        cache.acquire();
        cache.release();
        cache.acquire();
        assert!(!cache.is_frozen());
    }

    #[test]
    fn exceeding_process_limit_clears_instead_of_freezing() {
        let cache = DatabaseCache::new();
        cache.acquire();
        {
            let mut tables = cache.tables.write();
            for i in 0..(PROCESS_CACHE_LIMIT as u32 + 1) {
                tables.insert(ObjectId(i), CachedObject { object_id: ObjectId(i), serialized: vec![] });
            }
        }
        let kept = cache.release();
        assert!(!kept);
        assert_eq!(cache.len(), 0);
    }
}
