pub mod pagestore;
pub mod txn;

pub use pagestore::PageStoreHandle;
pub use txn::{LogCategory, Transaction};
