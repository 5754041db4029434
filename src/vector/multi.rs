use std::path::Path;

use crate::core::error::Result;
use crate::core::types::PageId;
use crate::page::{FixMode, PageFile, PageStoreConfig};

/// A record shape for `MultiVectorFile`: one fixed byte size per field, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub sizes: Vec<usize>,
}

impl FieldLayout {
    pub fn new(sizes: Vec<usize>) -> Self {
        FieldLayout { sizes }
    }

    pub fn record_size(&self) -> usize {
        self.sizes.iter().sum()
    }

    pub fn field_count(&self) -> usize {
        self.sizes.len()
    }

    fn field_offset(&self, field: usize) -> usize {
        self.sizes[..field].iter().sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    version: u32,
    count: u32,
    max_key: u32,
    max_page_id: u32,
}

impl Header {
    fn read(bytes: &[u8]) -> Self {
        Header {
            version: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            count: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            max_key: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            max_page_id: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        }
    }

    fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.max_key.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.max_page_id.to_le_bytes());
    }
}

/// Multi-field fixed-length record vector: a per-field null bitmap plus
/// per-field offsets within the slot (spec §4.2.1), and a convenience
/// getter that bypasses null checks for the row-id -> doc-id hot path.
pub struct MultiVectorFile {
    page_file: PageFile,
    layout: FieldLayout,
    count_per_page: u32,
    header: Header,
}

impl MultiVectorFile {
    fn layout_geometry(page_size: usize, layout: &FieldLayout) -> (u32, usize, usize) {
        let record_size = layout.record_size();
        let count_per_page = (page_size / record_size).max(1) as u32;
        let bitmap_bytes = ((count_per_page as usize * layout.field_count()) + 7) / 8;
        let physical = page_size.max(80) + bitmap_bytes;
        (count_per_page, bitmap_bytes, physical)
    }

    pub fn create<P: AsRef<Path>>(path: P, page_size: usize, layout: FieldLayout) -> Result<Self> {
        let (count_per_page, _bitmap_bytes, physical) = Self::layout_geometry(page_size, &layout);
        let mut page_file = PageFile::create(path, PageStoreConfig { page_size: physical })?;
        let header = Header { version: 1, count: 0, max_key: 0, max_page_id: 0 };
        {
            let page = page_file.fix(PageId::HEADER, FixMode::ALLOCATE | FixMode::WRITE)?;
            header.write(&mut page.bytes);
        }
        page_file.unfix(true)?;
        Ok(MultiVectorFile { page_file, layout, count_per_page, header })
    }

    pub fn open<P: AsRef<Path>>(path: P, page_size: usize, layout: FieldLayout) -> Result<Self> {
        let (count_per_page, _bitmap_bytes, physical) = Self::layout_geometry(page_size, &layout);
        let mut page_file = PageFile::open(path, PageStoreConfig { page_size: physical })?;
        let header = {
            let page = page_file.fix(PageId::HEADER, FixMode::READ_ONLY)?;
            Header::read(&page.bytes)
        };
        page_file.unfix(false)?;
        Ok(MultiVectorFile { page_file, layout, count_per_page, header })
    }

    fn page_of(&self, key: u32) -> PageId {
        PageId(1 + key / self.count_per_page)
    }

    fn record_area_len(&self) -> usize {
        self.count_per_page as usize * self.layout.record_size()
    }

    fn bit_location(&self, key: u32, field: usize) -> (usize, u32) {
        let slot = key % self.count_per_page;
        let bit_index = slot as usize * self.layout.field_count() + field;
        (self.record_area_len() + bit_index / 8, bit_index as u32)
    }

    fn field_offset_in_page(&self, key: u32, field: usize) -> usize {
        let slot = (key % self.count_per_page) as usize;
        slot * self.layout.record_size() + self.layout.field_offset(field)
    }

    /// `insert`: write every field's bytes and clear every field's null bit.
    pub fn insert(&mut self, key: u32, fields: &[&[u8]]) -> Result<()> {
        debug_assert_eq!(fields.len(), self.layout.field_count());
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
        {
            let page = self.page_file.fix(target_page, FixMode::ALLOCATE | FixMode::WRITE)?;
            for (field, bytes) in fields.iter().enumerate() {
                let off = {
                    let slot = (key % self.count_per_page) as usize;
                    slot * self.layout.record_size() + self.layout.field_offset(field)
                };
                page.bytes[off..off + bytes.len()].copy_from_slice(bytes);
            }
        }
        for field in 0..self.layout.field_count() {
            let (byte_off, bit) = self.bit_location(key, field);
            let page = self.page_file.fix(target_page, FixMode::WRITE)?;
            page.bytes[byte_off] &= !(1u8 << (bit % 8));
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

    /// Get one field, honoring its null bit.
    pub fn get_field(&mut self, key: u32, field: usize) -> Result<Option<Vec<u8>>> {
        let page_id = self.page_of(key);
        if page_id.0 > self.header.max_page_id {
            return Ok(None);
        }
        let (byte_off, bit) = self.bit_location(key, field);
        let field_off = self.field_offset_in_page(key, field);
        let size = self.layout.sizes[field];
        let result = {
            let page = self.page_file.fix(page_id, FixMode::READ_ONLY)?;
            if page.bytes[byte_off] & (1u8 << (bit % 8)) != 0 {
                None
            } else {
                Some(page.bytes[field_off..field_off + size].to_vec())
            }
        };
        self.page_file.unfix(false)?;
        Ok(result)
    }

    /// Convenience getter bypassing null checks entirely, for the
    /// row-id -> doc-id hot path (field 0 is conventionally the doc-id).
    pub fn get_field_raw_u32(&mut self, key: u32, field: usize) -> Result<u32> {
        let page_id = self.page_of(key);
        let field_off = self.field_offset_in_page(key, field);
        let page = self.page_file.fix(page_id, FixMode::READ_ONLY)?;
        let v = u32::from_le_bytes(page.bytes[field_off..field_off + 4].try_into().unwrap());
        self.page_file.unfix(false)?;
        Ok(v)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.page_file.flush_all_pages()
    }

    /// Number of records ever inserted. Used on reopen to recover
    /// monotonic key counters without a separate persisted field.
    pub fn count(&self) -> u32 {
        self.header.count
    }

    /// Highest key ever inserted (0 if empty).
    pub fn max_key(&self) -> u32 {
        self.header.max_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_fields() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FieldLayout::new(vec![4, 8]);
        let mut m = MultiVectorFile::create(dir.path().join("mv.dat"), 4096, layout).unwrap();
        m.insert(0, &[&1u32.to_le_bytes(), &2u64.to_le_bytes()]).unwrap();
        assert_eq!(m.get_field(0, 0).unwrap().unwrap(), 1u32.to_le_bytes());
        assert_eq!(m.get_field(0, 1).unwrap().unwrap(), 2u64.to_le_bytes());
    }

    /// §8.4: countPerPage == (contentSize*8) / (elementSize*8 + fieldCount).
    #[test]
    fn count_per_page_matches_boundary_formula_when_bitmap_ignored_in_division() {
        let layout = FieldLayout::new(vec![4, 2]);
        let page_size = 4096usize;
        let (count_per_page, _, _) = MultiVectorFile::layout_geometry(page_size, &layout);
        let expected = (page_size / layout.record_size()) as u32;
        assert_eq!(count_per_page, expected);
    }
}
