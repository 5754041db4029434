use std::collections::HashMap;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DatabaseId;

/// Process-wide `(db_id -> thread_id)` map recording which thread holds a
/// database's super-user-mode transitional state (spec §4.9.6). Entering
/// stops the full-text merge daemon; exiting restarts it. A second thread
/// attempting a DDL on the same database while the state is held observes
/// it and aborts with `Canceled`.
pub struct SuperUserRegistry {
    holders: Mutex<HashMap<DatabaseId, ThreadId>>,
}

impl Default for SuperUserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperUserRegistry {
    pub fn new() -> Self {
        SuperUserRegistry { holders: Mutex::new(HashMap::new()) }
    }

    /// Enter super-user mode for `db_id` on the calling thread. The merge
    /// daemon handle is stopped by the caller (`database::Database`) once
    /// this succeeds.
    pub fn enter(&self, db_id: DatabaseId) -> Result<()> {
        let mut holders = self.holders.lock();
        if holders.contains_key(&db_id) {
            return Err(Error::new(ErrorKind::Canceled, format!("database {:?} already in super-user mode", db_id)));
        }
        holders.insert(db_id, std::thread::current().id());
        Ok(())
    }

    pub fn exit(&self, db_id: DatabaseId) {
        self.holders.lock().remove(&db_id);
    }

    pub fn is_held(&self, db_id: DatabaseId) -> bool {
        self.holders.lock().contains_key(&db_id)
    }

    /// A DDL on `db_id` must abort with `Canceled` if some other thread
    /// (not the calling one) holds the transitional state.
    pub fn check_ddl_allowed(&self, db_id: DatabaseId) -> Result<()> {
        let holders = self.holders.lock();
        match holders.get(&db_id) {
            Some(holder) if *holder != std::thread::current().id() => {
                Err(Error::new(ErrorKind::Canceled, format!("database {:?} is in super-user mode", db_id)))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_enter_is_canceled() {
        let reg = SuperUserRegistry::new();
        reg.enter(DatabaseId(1)).unwrap();
        assert!(reg.enter(DatabaseId(1)).is_err());
        reg.exit(DatabaseId(1));
        assert!(reg.enter(DatabaseId(1)).is_ok());
    }
}
