pub mod store;

pub use store::{FixMode, Page, PageFile, PageStoreConfig};

use crate::core::types::PageId;

/// Bytes of per-page overhead reserved by the store itself (a version stamp
/// and a checksum). Content size handed to callers is `page_size - PAGE_OVERHEAD`.
pub const PAGE_OVERHEAD: usize = 12;

pub fn content_size(page_size: usize) -> usize {
    page_size - PAGE_OVERHEAD
}

pub fn page_of(key: u32, count_per_page: u32) -> PageId {
    PageId(1 + key / count_per_page)
}
