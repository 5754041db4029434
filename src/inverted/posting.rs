use crate::compression::compress::{EncodedIntegerBlock, IntegerEncodingType};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;

#[derive(Debug, Clone)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    pub positions: Vec<u32>,
    pub field_norm: f32,
}

/// Posting list for a term: sorted doc-id sequence plus optional TF and
/// location vectors (spec §3.1, §4.4). Append-only in memory so that
/// inserts and merge-folding stay monotonic on doc id (spec's insert step
/// 1: "append doc-id (append-only for monotonicity)"); `encode()` produces
/// the compressed on-disk representation using the same delta/vbyte scheme
/// the teacher's posting-list persistence already used.
#[derive(Debug, Clone)]
pub struct PostingList {
    postings: Vec<Posting>,
    pub no_location: bool,
    pub no_tf: bool,
}

impl PostingList {
    pub fn new(no_location: bool, no_tf: bool) -> Self {
        PostingList { postings: Vec::new(), no_location, no_tf }
    }

    /// Append a posting. Fails if it would break the monotonic doc-id
    /// invariant (spec §3.2.2).
    pub fn add_posting(&mut self, mut posting: Posting) -> Result<()> {
        if self.no_location {
            posting.positions.clear();
        }
        if self.no_tf {
            posting.term_freq = 1;
        }
        if let Some(last) = self.postings.last() {
            if posting.doc_id <= last.doc_id {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!("non-monotonic doc id {:?} after {:?}", posting.doc_id, last.doc_id),
                ));
            }
        }
        self.postings.push(posting);
        Ok(())
    }

    /// Fold another posting list's entries into this one, used by the
    /// delayed-index merge (`mergeList`, spec §4.6.1). Entries already
    /// present (doc id not greater than our current tail) are skipped
    /// rather than rejected, which is what makes a crash-and-resume of
    /// `mergeList` idempotent: re-running the fold over an
    /// already-(partially-)merged side never re-throws and never
    /// duplicates (spec §4.6.1's crash-safety note).
    pub fn fold_from(&mut self, other: &PostingList) -> Result<()> {
        for posting in &other.postings {
            let already_present = self.postings.last().map(|p| posting.doc_id <= p.doc_id).unwrap_or(false);
            if already_present {
                continue;
            }
            self.add_posting(posting.clone())?;
        }
        Ok(())
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    pub fn contains_doc(&self, doc_id: DocId) -> bool {
        self.postings.binary_search_by_key(&doc_id, |p| p.doc_id).is_ok()
    }

    /// Directly remove one document's posting. Only used for the
    /// current-insert cheap-delete path (spec §4.6: "if currentInsert
    /// contains R, remove directly"); the deferred path never calls this,
    /// which keeps merge-folding append-only and idempotent.
    pub fn remove_doc(&mut self, doc_id: DocId) -> bool {
        if let Ok(idx) = self.postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
            self.postings.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.postings.iter().map(|p| p.doc_id).collect()
    }

    /// Compressed on-disk representation: delta-encoded doc ids, vbyte
    /// positions. Grounded on `compression::compress::EncodedIntegerBlock`.
    pub fn encode(&self) -> Result<EncodedPostingList> {
        let doc_ids: Vec<u32> = self.postings.iter().map(|p| p.doc_id.0 as u32).collect();
        let encoded_ids = EncodedIntegerBlock::encode(&doc_ids, IntegerEncodingType::Delta)?;
        let mut positions = Vec::new();
        for posting in &self.postings {
            positions.push(EncodedIntegerBlock::encode(&posting.positions, IntegerEncodingType::VByte)?);
        }
        Ok(EncodedPostingList {
            doc_ids: encoded_ids,
            term_freqs: self.postings.iter().map(|p| p.term_freq).collect(),
            positions,
        })
    }
}

pub struct EncodedPostingList {
    pub doc_ids: EncodedIntegerBlock,
    pub term_freqs: Vec<u32>,
    pub positions: Vec<EncodedIntegerBlock>,
}

impl EncodedPostingList {
    pub fn decode_doc_ids(&self) -> Result<Vec<u32>> {
        self.doc_ids.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_only_rejects_non_monotonic() {
        let mut pl = PostingList::new(false, false);
        pl.add_posting(Posting { doc_id: DocId(2), term_freq: 1, positions: vec![0], field_norm: 1.0 }).unwrap();
        let err = pl.add_posting(Posting { doc_id: DocId(1), term_freq: 1, positions: vec![0], field_norm: 1.0 });
        assert!(err.is_err());
    }

    #[test]
    fn fold_from_merges_in_order() {
        let mut big = PostingList::new(false, false);
        big.add_posting(Posting { doc_id: DocId(1), term_freq: 1, positions: vec![], field_norm: 1.0 }).unwrap();
        let mut small = PostingList::new(false, false);
        small.add_posting(Posting { doc_id: DocId(2), term_freq: 1, positions: vec![], field_norm: 1.0 }).unwrap();
        small.add_posting(Posting { doc_id: DocId(3), term_freq: 1, positions: vec![], field_norm: 1.0 }).unwrap();
        big.fold_from(&small).unwrap();
        assert_eq!(big.doc_ids(), vec![DocId(1), DocId(2), DocId(3)]);
    }
}
