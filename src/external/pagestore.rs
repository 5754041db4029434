use crate::page::store::VersionedPageStore;

/// Wraps the consumed page-store boundary (spec §4.1, §6.1) so callers
/// outside `page` can depend on the trait without reaching into its
/// concrete implementation.
pub trait PageStoreHandle: VersionedPageStore {}

impl<T: VersionedPageStore> PageStoreHandle for T {}
