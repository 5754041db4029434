use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::{BitOr, BitAnd};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::PageId;

/// Fix modes, combinable as bit flags (spec §4.1, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixMode(u8);

impl FixMode {
    pub const READ_ONLY: FixMode = FixMode(1);
    pub const WRITE: FixMode = FixMode(2);
    pub const ALLOCATE: FixMode = FixMode(4);
    pub const DISCARDABLE: FixMode = FixMode(8);

    pub fn contains(&self, other: FixMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_write(&self) -> bool {
        self.contains(FixMode::WRITE) || self.contains(FixMode::ALLOCATE)
    }
}

impl BitOr for FixMode {
    type Output = FixMode;
    fn bitor(self, rhs: FixMode) -> FixMode {
        FixMode(self.0 | rhs.0)
    }
}

impl BitAnd for FixMode {
    type Output = FixMode;
    fn bitand(self, rhs: FixMode) -> FixMode {
        FixMode(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub bytes: Vec<u8>,
    dirty: bool,
}

impl Page {
    fn blank(id: PageId, page_size: usize) -> Self {
        // null-bitmap invariant (spec §3.2.8): freshly allocated pages are 0xff.
        Page { id, bytes: vec![0xffu8; page_size], dirty: false }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug, Clone)]
pub struct PageStoreConfig {
    pub page_size: usize,
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        PageStoreConfig { page_size: 8192 }
    }
}

/// A single page-managed file: fix/unfix with a one-slot "current page"
/// cache plus a dirty-page map, matching the discipline described for
/// `VectorFile` in spec §4.2 and generalized here for `MainFile` and the
/// vector-file family.
pub struct PageFile {
    path: PathBuf,
    file: File,
    config: PageStoreConfig,
    current: Option<Page>,
    dirty: HashMap<PageId, Page>,
    max_page_id: PageId,
}

impl PageFile {
    pub fn create<P: AsRef<Path>>(path: P, config: PageStoreConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(PageFile {
            path: path.as_ref().to_path_buf(),
            file,
            config,
            current: None,
            dirty: HashMap::new(),
            max_page_id: PageId(0),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, config: PageStoreConfig) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        let page_bytes = (config.page_size + 4) as u64;
        let max_page_id = if page_bytes == 0 { PageId(0) } else {
            PageId(((len / page_bytes).max(1) - 1) as u32)
        };
        Ok(PageFile {
            path: path.as_ref().to_path_buf(),
            file,
            config,
            current: None,
            dirty: HashMap::new(),
            max_page_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_page_id(&self) -> PageId {
        self.max_page_id
    }

    pub fn content_size(&self) -> usize {
        super::content_size(self.config.page_size)
    }

    /// Move the current page slot to the dirty map (or drop it) before
    /// swapping in a different page, as described in §4.2's dirty-page
    /// discipline paragraph.
    fn evict_current(&mut self) {
        if let Some(page) = self.current.take() {
            if page.is_dirty() {
                self.dirty.insert(page.id, page);
            }
        }
    }

    pub fn fix(&mut self, id: PageId, mode: FixMode) -> Result<&mut Page> {
        if let Some(page) = &self.current {
            if page.id != id {
                self.evict_current();
            }
        }

        if self.current.is_none() {
            if let Some(page) = self.dirty.remove(&id) {
                self.current = Some(page);
            } else {
                let page = self.read_page_from_disk(id, mode)?;
                self.current = Some(page);
            }
        }

        if mode.is_write() {
            self.current.as_mut().unwrap().mark_dirty();
        }
        if id.0 > self.max_page_id.0 {
            self.max_page_id = id;
        }
        Ok(self.current.as_mut().unwrap())
    }

    fn read_page_from_disk(&mut self, id: PageId, mode: FixMode) -> Result<Page> {
        if mode.contains(FixMode::ALLOCATE) {
            return Ok(Page::blank(id, self.config.page_size));
        }
        let offset = (id.0 as u64) * (self.config.page_size as u64 + 4);
        let mut buf = vec![0u8; self.config.page_size];
        if self.file.seek(SeekFrom::Start(offset)).is_err() {
            return Ok(Page::blank(id, self.config.page_size));
        }
        match self.file.read_exact(&mut buf) {
            Ok(()) => Ok(Page { id, bytes: buf, dirty: false }),
            Err(_) => Ok(Page::blank(id, self.config.page_size)),
        }
    }

    fn write_page_to_disk(&mut self, page: &Page) -> Result<()> {
        let offset = (page.id.0 as u64) * (self.config.page_size as u64 + 4);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.bytes)?;
        let mut hasher = Hasher::new();
        hasher.update(&page.bytes);
        self.file.write_all(&hasher.finalize().to_le_bytes())?;
        Ok(())
    }

    /// `unfix(commit)`: commit writes back the page bytes and clears its
    /// dirty flag; discard simply drops it without writing.
    pub fn unfix(&mut self, commit: bool) -> Result<()> {
        if let Some(page) = self.current.take() {
            if commit && page.is_dirty() {
                self.write_page_to_disk(&page)?;
            }
        }
        Ok(())
    }

    /// `flushAllPages(commit=true)`: walk the current page and the dirty map.
    pub fn flush_all_pages(&mut self) -> Result<()> {
        self.evict_current();
        let pages: Vec<Page> = self.dirty.drain().map(|(_, p)| p).collect();
        for page in pages {
            if page.is_dirty() {
                self.write_page_to_disk(&page)?;
            }
        }
        self.file.flush()?;
        Ok(())
    }

    /// `recoverAllPages(commit=false)`: discard every in-memory page,
    /// preserving `max_page_id` (allocations are not rolled back, per §4.2).
    pub fn recover_all_pages(&mut self) {
        self.current = None;
        self.dirty.clear();
    }

    pub fn sync(&mut self) -> Result<()> {
        self.flush_all_pages()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Flushes, then relocates the backing file to `new_path` (spec §2's
    /// "verify, rename" responsibility). The open handle keeps pointing at
    /// the same inode; only `self.path` and the directory entry change.
    pub fn rename<P: AsRef<Path>>(&mut self, new_path: P) -> Result<()> {
        self.flush_all_pages()?;
        let new_path = new_path.as_ref();
        if let Err(e) = std::fs::rename(&self.path, new_path) {
            if e.raw_os_error() == Some(libc::EXDEV) {
                std::fs::copy(&self.path, new_path)?;
                std::fs::remove_file(&self.path)?;
            } else {
                return Err(e.into());
            }
        }
        self.path = new_path.to_path_buf();
        Ok(())
    }
}

/// The page-store contract the core relies on (spec §4.1, §6.1). Real
/// deployments plug in whatever external versioned-page-store backend they
/// have; `PageFile` above is the in-crate reference implementation used by
/// `vector` and `mainfile`.
pub trait VersionedPageStore {
    fn fix(&mut self, page_id: PageId, mode: FixMode) -> Result<&mut Page>;
    fn unfix(&mut self, commit: bool) -> Result<()>;
    fn recover(&mut self);
    fn sync(&mut self) -> Result<()>;
}

impl VersionedPageStore for PageFile {
    fn fix(&mut self, page_id: PageId, mode: FixMode) -> Result<&mut Page> {
        self.fix(page_id, mode)
    }

    fn unfix(&mut self, commit: bool) -> Result<()> {
        self.unfix(commit)
    }

    fn recover(&mut self) {
        self.recover_all_pages()
    }

    fn sync(&mut self) -> Result<()> {
        self.sync()
    }
}

pub fn invalid_page(context: &str) -> Error {
    Error::new(ErrorKind::Internal, context.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_allocate_fills_0xff() {
        let dir = tempfile::tempdir().unwrap();
        let mut pf = PageFile::create(dir.path().join("p.dat"), PageStoreConfig { page_size: 256 }).unwrap();
        let page = pf.fix(PageId(3), FixMode::ALLOCATE | FixMode::WRITE).unwrap();
        assert!(page.bytes.iter().all(|&b| b == 0xff));
        pf.unfix(true).unwrap();
    }

    #[test]
    fn unfix_commit_then_reopen_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.dat");
        {
            let mut pf = PageFile::create(&path, PageStoreConfig { page_size: 256 }).unwrap();
            let page = pf.fix(PageId(1), FixMode::ALLOCATE | FixMode::WRITE).unwrap();
            page.bytes[0] = 0x42;
            pf.unfix(true).unwrap();
        }
        {
            let mut pf = PageFile::open(&path, PageStoreConfig { page_size: 256 }).unwrap();
            let page = pf.fix(PageId(1), FixMode::READ_ONLY).unwrap();
            assert_eq!(page.bytes[0], 0x42);
        }
    }
}
