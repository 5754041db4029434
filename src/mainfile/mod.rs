use std::collections::VecDeque;
use std::path::Path;

use crate::core::error::Result;
use crate::core::types::PageId;
use crate::page::{FixMode, PageFile, PageStoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    High,
}

/// Verify treatment bitmask (spec glossary): `Correct` auto-repairs,
/// `Continue` proceeds past the first error, `Cascade` drills into children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Treatment(u8);

impl Treatment {
    pub const NONE: Treatment = Treatment(0);
    pub const CORRECT: Treatment = Treatment(1);
    pub const CONTINUE: Treatment = Treatment(2);
    pub const CASCADE: Treatment = Treatment(4);

    pub fn contains(&self, other: Treatment) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Treatment {
    type Output = Treatment;
    fn bitor(self, rhs: Treatment) -> Treatment {
        Treatment(self.0 | rhs.0)
    }
}

#[derive(Debug, Default)]
pub struct VerifyProgress {
    pub pages_checked: usize,
    pub errors: Vec<String>,
}

/// Common base for files storing paged structured content (spec §4.3):
/// physical file handle, LRU page list, dirty-page map (delegated to
/// `PageFile`), a free-list of released pages, and verify state.
///
/// Grounded on `memory::buffer_pool::BufferPool`'s LRU-eviction shape and
/// `storage::segment`'s attach/detach of physical pages.
pub struct MainFile {
    page_file: PageFile,
    lru: VecDeque<PageId>,
    cache_count_high_water: usize,
    free_list: Vec<PageId>,
    pub treatment: Treatment,
    pub progress: VerifyProgress,
}

impl MainFile {
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize, cache_count_high_water: usize) -> Result<Self> {
        let page_file = PageFile::create(path, PageStoreConfig { page_size })?;
        Ok(MainFile {
            page_file,
            lru: VecDeque::new(),
            cache_count_high_water,
            free_list: Vec::new(),
            treatment: Treatment::NONE,
            progress: VerifyProgress::default(),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, page_size: usize, cache_count_high_water: usize) -> Result<Self> {
        let page_file = PageFile::open(path, PageStoreConfig { page_size })?;
        Ok(MainFile {
            page_file,
            lru: VecDeque::new(),
            cache_count_high_water,
            free_list: Vec::new(),
            treatment: Treatment::NONE,
            progress: VerifyProgress::default(),
        })
    }

    fn touch_lru(&mut self, id: PageId) {
        self.lru.retain(|&p| p != id);
        self.lru.push_back(id);
        while self.lru.len() > self.cache_count_high_water {
            self.lru.pop_front();
        }
    }

    /// `attachPhysicalPage(id, priority)`. In verify mode, the store's
    /// verify-first protocol runs (here: the page is read read-only and
    /// counted in `progress` before any write path is taken); outside
    /// verify it is a direct fix.
    pub fn attach_physical_page(&mut self, id: PageId, mode: FixMode, _priority: Priority) -> Result<()> {
        if self.treatment.contains(Treatment::CORRECT) || self.treatment.contains(Treatment::CONTINUE) {
            self.page_file.fix(id, FixMode::READ_ONLY)?;
            self.progress.pages_checked += 1;
            self.page_file.unfix(false)?;
        }
        self.page_file.fix(id, mode)?;
        self.touch_lru(id);
        Ok(())
    }

    /// `detachPhysicalPage`: commits iff the page's unfix mode is dirty.
    pub fn detach_physical_page(&mut self, dirty: bool) -> Result<()> {
        self.page_file.unfix(dirty)
    }

    /// `recoverPhysicalPage`: unconditionally discards.
    pub fn recover_physical_page(&mut self) {
        self.page_file.recover_all_pages();
    }

    pub fn release_to_free_list(&mut self, id: PageId) {
        self.free_list.push(id);
    }

    pub fn allocate_from_free_list(&mut self) -> Option<PageId> {
        self.free_list.pop()
    }

    pub fn begin_verify(&mut self, treatment: Treatment) {
        self.treatment = treatment;
        self.progress = VerifyProgress::default();
    }

    pub fn flush(&mut self) -> Result<()> {
        self.page_file.flush_all_pages()
    }

    pub fn path(&self) -> &Path {
        self.page_file.path()
    }

    /// `rename(new_path)` (spec §2): flushes dirty pages, then relocates
    /// the backing file. Used by `database::lifecycle::Database::move_paths`
    /// when an `ALTER DATABASE ... MOVE` changes where a main file lives.
    pub fn rename<P: AsRef<Path>>(&mut self, new_path: P) -> Result<()> {
        self.page_file.rename(new_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_beyond_high_water() {
        let dir = tempfile::tempdir().unwrap();
        let mut mf = MainFile::create(dir.path().join("m.dat"), 512, 2).unwrap();
        for i in 1..=4u32 {
            mf.attach_physical_page(PageId(i), FixMode::ALLOCATE | FixMode::WRITE, Priority::Low).unwrap();
            mf.detach_physical_page(true).unwrap();
        }
        assert!(mf.lru.len() <= 2);
    }

    #[test]
    fn rename_relocates_backing_file_and_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("m.dat");
        let new_path = dir.path().join("moved.dat");
        let mut mf = MainFile::create(&old_path, 512, 4).unwrap();
        mf.attach_physical_page(PageId(1), FixMode::ALLOCATE | FixMode::WRITE, Priority::Low).unwrap();
        mf.detach_physical_page(true).unwrap();

        mf.rename(&new_path).unwrap();
        assert_eq!(mf.path(), new_path.as_path());
        assert!(!old_path.exists());
        assert!(new_path.exists());
    }

    #[test]
    fn free_list_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let mut mf = MainFile::create(dir.path().join("m.dat"), 512, 4).unwrap();
        mf.release_to_free_list(PageId(9));
        assert_eq!(mf.allocate_from_free_list(), Some(PageId(9)));
        assert_eq!(mf.allocate_from_free_list(), None);
    }
}
