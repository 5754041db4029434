use crate::core::error::Result;

/// Log categories a database's logical log is split into (spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    System,
    Database,
}

/// The transaction/log surface the core relies on (spec §6.2); owned and
/// implemented outside this crate. `database::Database` and `delay`'s
/// merge worker both hold one per operation.
pub trait Transaction {
    fn begin_batch_insert(&mut self) -> Result<()>;
    fn end_batch_insert(&mut self) -> Result<()>;
    fn is_canceled_statement(&self) -> bool;
    fn is_no_lock(&self) -> bool;

    fn get_log(&self, category: LogCategory) -> Result<()>;
    fn mount_log(&mut self, category: LogCategory) -> Result<()>;
    fn unmount_log(&mut self, category: LogCategory) -> Result<()>;
    fn flush_log(&mut self, category: LogCategory) -> Result<()>;
    fn rename_log(&mut self, category: LogCategory, new_name: &str) -> Result<()>;
    fn destroy_log(&mut self, category: LogCategory) -> Result<()>;
    fn create_log(&mut self, category: LogCategory) -> Result<()>;
    fn set_log(&mut self, database_id: crate::core::types::DatabaseId) -> Result<()>;
}
