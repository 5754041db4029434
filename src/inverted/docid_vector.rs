use std::path::Path;

use crate::core::error::Result;
use crate::core::types::{DocId, RowId};
use crate::vector::{FieldLayout, MultiVectorFile};

/// Per-unit map row-id -> doc-id -> (optional) document length (spec §3.1).
/// Backed by a two-field `MultiVectorFile`: field 0 is the doc id, field 1
/// the token-count length.
pub struct DocIdVector {
    store: MultiVectorFile,
}

impl DocIdVector {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let layout = FieldLayout::new(vec![4, 4]);
        Ok(DocIdVector { store: MultiVectorFile::create(path, 8192, layout)? })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let layout = FieldLayout::new(vec![4, 4]);
        Ok(DocIdVector { store: MultiVectorFile::open(path, 8192, layout)? })
    }

    pub fn assign(&mut self, row_id: RowId, doc_id: DocId, length: u32) -> Result<()> {
        self.store.insert(row_id.0, &[&(doc_id.0 as u32).to_le_bytes(), &length.to_le_bytes()])
    }

    pub fn doc_id_of(&mut self, row_id: RowId) -> Result<Option<DocId>> {
        match self.store.get_field(row_id.0, 0)? {
            Some(bytes) => Ok(Some(DocId(u32::from_le_bytes(bytes.try_into().unwrap()) as u64))),
            None => Ok(None),
        }
    }

    pub fn length_of(&mut self, row_id: RowId) -> Result<Option<u32>> {
        match self.store.get_field(row_id.0, 1)? {
            Some(bytes) => Ok(Some(u32::from_le_bytes(bytes.try_into().unwrap()))),
            None => Ok(None),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Number of rows ever assigned a doc id in this unit.
    pub fn count(&self) -> u32 {
        self.store.count()
    }

    /// Visit every row currently holding a doc id, in row-id order.
    pub fn for_each(&mut self, mut f: impl FnMut(RowId, DocId, u32)) -> Result<()> {
        for row in 0..=self.store.max_key() {
            if let Some(doc_bytes) = self.store.get_field(row, 0)? {
                let doc_id = DocId(u32::from_le_bytes(doc_bytes.try_into().unwrap()) as u64);
                let length = self
                    .store
                    .get_field(row, 1)?
                    .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
                    .unwrap_or(0);
                f(RowId(row), doc_id, length);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = DocIdVector::create(dir.path().join("docid.dat")).unwrap();
        v.assign(RowId(1), DocId(100), 42).unwrap();
        assert_eq!(v.doc_id_of(RowId(1)).unwrap(), Some(DocId(100)));
        assert_eq!(v.length_of(RowId(1)).unwrap(), Some(42));
    }
}
