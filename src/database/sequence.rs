use std::path::Path;

use crate::core::error::Result;
use crate::core::types::{ObjectId, PageId};
use crate::page::{FixMode, PageFile, PageStoreConfig};

/// The database-wide object-id sequence (spec §3.1, §4.9.2): a single
/// monotonic counter persisted in its own file, handed out to every new
/// area/table/column/constraint/... row a database's schema gains.
pub struct ObjectIdSequence {
    page_file: PageFile,
    next: u32,
}

impl ObjectIdSequence {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut page_file = PageFile::create(path, PageStoreConfig { page_size: 64 })?;
        let next = 1u32;
        {
            let page = page_file.fix(PageId::HEADER, FixMode::ALLOCATE | FixMode::WRITE)?;
            page.bytes[0..4].copy_from_slice(&next.to_le_bytes());
        }
        page_file.unfix(true)?;
        Ok(ObjectIdSequence { page_file, next })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut page_file = PageFile::open(path, PageStoreConfig { page_size: 64 })?;
        let next = {
            let page = page_file.fix(PageId::HEADER, FixMode::READ_ONLY)?;
            u32::from_le_bytes(page.bytes[0..4].try_into().unwrap())
        };
        page_file.unfix(false)?;
        Ok(ObjectIdSequence { page_file, next })
    }

    /// Hands out the next id and persists the advanced counter before
    /// returning, so a crash right after this call never hands the same
    /// id out twice.
    pub fn next_id(&mut self) -> Result<ObjectId> {
        let id = self.next;
        self.next += 1;
        let page = self.page_file.fix(PageId::HEADER, FixMode::WRITE)?;
        page.bytes[0..4].copy_from_slice(&self.next.to_le_bytes());
        self.page_file.unfix(true)?;
        Ok(ObjectId(id))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.page_file.flush_all_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objid.seq");
        {
            let mut seq = ObjectIdSequence::create(&path).unwrap();
            assert_eq!(seq.next_id().unwrap(), ObjectId(1));
            assert_eq!(seq.next_id().unwrap(), ObjectId(2));
        }
        let mut reopened = ObjectIdSequence::open(&path).unwrap();
        assert_eq!(reopened.next_id().unwrap(), ObjectId(3));
    }
}
