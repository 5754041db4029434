use std::path::Path;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, RowId, UnitNumber};
use crate::vector::{FieldLayout, MultiVectorFile};

/// `ExpungeIDVectorFile`: small-doc-id -> `(big-doc-id, big-unit-number)`
/// (spec §4.5, §6.4). Record size is exactly `sizeof(u32)+sizeof(u32)`;
/// null is all-bits-one, matched here by treating doc id `u32::MAX` as the
/// sentinel (consistent with `RowId::UNDEFINED`/`DocId` conventions used
/// elsewhere in this crate).
pub struct ExpungeIdVectorFile {
    store: MultiVectorFile,
    next_small_doc_id: u32,
}

const NULL_U32: u32 = u32::MAX;

impl ExpungeIdVectorFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let layout = FieldLayout::new(vec![4, 4]);
        Ok(ExpungeIdVectorFile { store: MultiVectorFile::create(path, 8192, layout)?, next_small_doc_id: 0 })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let layout = FieldLayout::new(vec![4, 4]);
        let store = MultiVectorFile::open(path, 8192, layout)?;
        let next_small_doc_id = store.count();
        Ok(ExpungeIdVectorFile { store, next_small_doc_id })
    }

    pub fn count(&self) -> u32 {
        self.store.count()
    }

    pub fn expunge_id_vector(&mut self, small_doc_id: u32) -> Result<()> {
        self.store.insert(small_doc_id, &[&NULL_U32.to_le_bytes(), &NULL_U32.to_le_bytes()])
    }

    pub fn convert_to_big_document_id(&mut self, small_doc_id: u32) -> Result<(DocId, UnitNumber)> {
        let big_doc_id = self.store.get_field(small_doc_id, 0)?;
        let unit_number = self.store.get_field(small_doc_id, 1)?;
        match (big_doc_id, unit_number) {
            (Some(d), Some(u)) => {
                let d = u32::from_le_bytes(d.try_into().unwrap());
                let u = u32::from_le_bytes(u.try_into().unwrap());
                if d == NULL_U32 {
                    return Err(Error::new(ErrorKind::UndefinedDocumentID, format!("small doc id {}", small_doc_id)));
                }
                Ok((DocId(d as u64), UnitNumber(u)))
            }
            _ => Err(Error::new(ErrorKind::UndefinedDocumentID, format!("small doc id {}", small_doc_id))),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

/// Delete-side small index. Forces `nolocation = true, no_tf = true` and
/// owns an `ExpungeIDVectorFile` so deferred deletions can be translated
/// back to the big index at merge time (spec §4.5).
pub struct ExpungeUnit {
    pub expunge_ids: ExpungeIdVectorFile,
    next_small_doc_id: u32,
}

impl ExpungeUnit {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(ExpungeUnit { expunge_ids: ExpungeIdVectorFile::create(path)?, next_small_doc_id: 0 })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expunge_ids = ExpungeIdVectorFile::open(path)?;
        let next_small_doc_id = expunge_ids.count();
        Ok(ExpungeUnit { expunge_ids, next_small_doc_id })
    }

    /// `assignDocumentID(big_doc_id, big_unit_number) -> small_doc_id`:
    /// appends a new key = `max_key + 1`.
    pub fn assign_document_id(&mut self, big_doc_id: DocId, big_unit: UnitNumber) -> Result<u32> {
        let small_doc_id = self.next_small_doc_id;
        self.next_small_doc_id += 1;
        self.expunge_ids
            .store
            .insert(small_doc_id, &[&(big_doc_id.0 as u32).to_le_bytes(), &big_unit.0.to_le_bytes()])?;
        Ok(small_doc_id)
    }

    pub fn convert_to_big_document_id(&mut self, small_doc_id: u32) -> Result<(DocId, UnitNumber)> {
        self.expunge_ids.convert_to_big_document_id(small_doc_id)
    }

    pub fn expunge_id_vector(&mut self, small_doc_id: u32) -> Result<()> {
        self.expunge_ids.expunge_id_vector(small_doc_id)
    }

    /// `getAll(&mut out)`: for verify/rebuild.
    pub fn get_all(&mut self, out: &mut Vec<RowId>) -> Result<()> {
        for key in 0..self.next_small_doc_id {
            if self.expunge_ids.convert_to_big_document_id(key).is_ok() {
                out.push(RowId(key));
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.expunge_ids.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_convert_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut unit = ExpungeUnit::create(dir.path().join("expunge.dat")).unwrap();
        let small = unit.assign_document_id(DocId(42), UnitNumber(0)).unwrap();
        let (big, unit_no) = unit.convert_to_big_document_id(small).unwrap();
        assert_eq!(big, DocId(42));
        assert_eq!(unit_no, UnitNumber(0));
    }

    #[test]
    fn undefined_document_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut unit = ExpungeUnit::create(dir.path().join("expunge.dat")).unwrap();
        assert!(unit.convert_to_big_document_id(999).is_err());
    }
}
