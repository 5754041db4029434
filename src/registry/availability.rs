use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::types::{DatabaseId, FileId};

/// A boolean per `(database_id, file_id)`, `file_id = FileId::DATABASE`
/// meaning the database itself (spec §4.11). Any subsystem calls
/// `set_availability(name, false)` on an unrecoverable error; every later
/// operation on that name then fails with `DatabaseNotAvailable`.
#[derive(Default)]
pub struct AvailabilityRegistry {
    flags: RwLock<HashMap<(DatabaseId, FileId), bool>>,
}

impl AvailabilityRegistry {
    pub fn new() -> Self {
        AvailabilityRegistry { flags: RwLock::new(HashMap::new()) }
    }

    pub fn set_availability(&self, database_id: DatabaseId, file_id: FileId, available: bool) {
        self.flags.write().insert((database_id, file_id), available);
    }

    /// Unset entries default to available, since nothing has failed yet.
    pub fn is_available(&self, database_id: DatabaseId, file_id: FileId) -> bool {
        *self.flags.read().get(&(database_id, file_id)).unwrap_or(&true)
    }

    pub fn is_database_available(&self, database_id: DatabaseId) -> bool {
        self.is_available(database_id, FileId::DATABASE)
    }

    /// System-wide availability is the AND of every known per-database flag.
    pub fn system_available(&self) -> bool {
        self.flags.read().values().all(|&v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_entries_default_available() {
        let reg = AvailabilityRegistry::new();
        assert!(reg.is_database_available(DatabaseId(1)));
    }

    #[test]
    fn cleared_flag_propagates_to_system_wide() {
        let reg = AvailabilityRegistry::new();
        reg.set_availability(DatabaseId(1), FileId::DATABASE, false);
        assert!(!reg.is_database_available(DatabaseId(1)));
        assert!(!reg.system_available());
    }
}
