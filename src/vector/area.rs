use std::path::Path;

use crate::core::error::Result;
use crate::core::types::{AreaId, PageId};
use crate::page::{FixMode, PageFile, PageStoreConfig};

const VALUE_SIZE: usize = 6; // u32 page_id + u16 area_id
const NULL_SENTINEL: [u8; VALUE_SIZE] = [0xff; VALUE_SIZE];

#[derive(Debug, Clone, Copy)]
struct Header {
    count: u32,
    max_key: u32,
    max_page_id: u32,
}

impl Header {
    fn read(bytes: &[u8]) -> Self {
        Header {
            count: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            max_key: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            max_page_id: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        }
    }

    fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&1u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.max_key.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.max_page_id.to_le_bytes());
    }
}

/// Key -> `(page_id, area_id)` mapping for variable-length areas (spec
/// §4.2.2). Uses an all-bits-one sentinel for null rather than a separate
/// bitmap, per §6.4's persisted layout note.
pub struct AreaVectorFile {
    page_file: PageFile,
    count_per_page: u32,
    header: Header,
}

impl AreaVectorFile {
    fn geometry(page_size: usize) -> (u32, usize) {
        let count_per_page = (page_size / VALUE_SIZE).max(1) as u32;
        (count_per_page, page_size)
    }

    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let (count_per_page, physical) = Self::geometry(page_size);
        let mut page_file = PageFile::create(path, PageStoreConfig { page_size: physical })?;
        let header = Header { count: 0, max_key: 0, max_page_id: 0 };
        {
            let page = page_file.fix(PageId::HEADER, FixMode::ALLOCATE | FixMode::WRITE)?;
            header.write(&mut page.bytes);
        }
        page_file.unfix(true)?;
        Ok(AreaVectorFile { page_file, count_per_page, header })
    }

    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let (count_per_page, physical) = Self::geometry(page_size);
        let mut page_file = PageFile::open(path, PageStoreConfig { page_size: physical })?;
        let header = {
            let page = page_file.fix(PageId::HEADER, FixMode::READ_ONLY)?;
            Header::read(&page.bytes)
        };
        page_file.unfix(false)?;
        Ok(AreaVectorFile { page_file, count_per_page, header })
    }

    fn page_of(&self, key: u32) -> PageId {
        PageId(1 + key / self.count_per_page)
    }

    fn slot_offset(&self, key: u32) -> usize {
        (key % self.count_per_page) as usize * VALUE_SIZE
    }

    fn encode(page_id: PageId, area_id: AreaId) -> [u8; VALUE_SIZE] {
        let mut buf = [0u8; VALUE_SIZE];
        buf[0..4].copy_from_slice(&page_id.0.to_le_bytes());
        buf[4..6].copy_from_slice(&area_id.0.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Option<(PageId, AreaId)> {
        if buf == NULL_SENTINEL {
            return None;
        }
        let page_id = PageId(u32::from_le_bytes(buf[0..4].try_into().unwrap()));
        let area_id = AreaId(u16::from_le_bytes(buf[4..6].try_into().unwrap()));
        Some((page_id, area_id))
    }

    pub fn insert(&mut self, key: u32, page_id: PageId, area_id: AreaId) -> Result<()> {
        let target_page = self.page_of(key);
        let prev_max = self.header.max_page_id;
        if target_page.0 > prev_max {
            let mut p = prev_max + 1;
            while p < target_page.0 {
                let page = self.page_file.fix(PageId(p), FixMode::ALLOCATE | FixMode::WRITE)?;
                page.mark_dirty();
                self.page_file.unfix(true)?;
                p += 1;
            }
        }
        let off = self.slot_offset(key);
        {
            let page = self.page_file.fix(target_page, FixMode::ALLOCATE | FixMode::WRITE)?;
            page.bytes[off..off + VALUE_SIZE].copy_from_slice(&Self::encode(page_id, area_id));
        }
        self.page_file.unfix(true)?;

        self.header.count += 1;
        if key > self.header.max_key || self.header.count == 1 {
            self.header.max_key = key;
        }
        if target_page.0 > self.header.max_page_id {
            self.header.max_page_id = target_page.0;
        }
        let header = self.header;
        let page = self.page_file.fix(PageId::HEADER, FixMode::WRITE)?;
        header.write(&mut page.bytes);
        self.page_file.unfix(true)
    }

    pub fn get(&mut self, key: u32) -> Result<Option<(PageId, AreaId)>> {
        let page_id = self.page_of(key);
        if page_id.0 > self.header.max_page_id {
            return Ok(None);
        }
        let off = self.slot_offset(key);
        let value = {
            let page = self.page_file.fix(page_id, FixMode::READ_ONLY)?;
            Self::decode(&page.bytes[off..off + VALUE_SIZE])
        };
        self.page_file.unfix(false)?;
        Ok(value)
    }

    /// `getAll(&mut present)`: streams page-by-page, collecting every
    /// present key.
    pub fn get_all(&mut self, present: &mut Vec<u32>) -> Result<()> {
        for p in 1..=self.header.max_page_id {
            let entries = self.get_page_data(PageId(p))?;
            let base = (p - 1) * self.count_per_page;
            for (slot, _) in entries {
                present.push(base + slot);
            }
        }
        Ok(())
    }

    /// `getPageData(page_id)`: densely packed list of present entries, for
    /// migration/verify.
    pub fn get_page_data(&mut self, page_id: PageId) -> Result<Vec<(u32, (PageId, AreaId))>> {
        if page_id.0 > self.header.max_page_id || page_id.0 == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let page = self.page_file.fix(page_id, FixMode::READ_ONLY)?;
        for slot in 0..self.count_per_page as usize {
            let off = slot * VALUE_SIZE;
            if let Some(v) = Self::decode(&page.bytes[off..off + VALUE_SIZE]) {
                out.push((slot as u32, v));
            }
        }
        self.page_file.unfix(false)?;
        Ok(out)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.page_file.flush_all_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_and_null_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = AreaVectorFile::create(dir.path().join("a.dat"), 4096).unwrap();
        assert!(a.get(3).unwrap().is_none());
        a.insert(3, PageId(7), AreaId(2)).unwrap();
        assert_eq!(a.get(3).unwrap().unwrap(), (PageId(7), AreaId(2)));
    }

    #[test]
    fn get_page_data_is_dense() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = AreaVectorFile::create(dir.path().join("a.dat"), 4096).unwrap();
        a.insert(0, PageId(1), AreaId(0)).unwrap();
        a.insert(5, PageId(2), AreaId(1)).unwrap();
        let data = a.get_page_data(PageId(1)).unwrap();
        assert_eq!(data.len(), 2);
    }
}
