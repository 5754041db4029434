use crate::core::types::DocId;
use crate::inverted::posting::PostingList;

/// Skip list over a posting list's doc ids, for fast intersection.
pub struct SkipList {
    pub entries: Vec<SkipEntry>,
    pub skip_interval: usize,
}

pub struct SkipEntry {
    pub doc_id: DocId,
    pub skip_to: Option<usize>,
}

impl SkipList {
    pub fn build(posting_list: &PostingList) -> Self {
        let interval = ((posting_list.len() as f32).sqrt() as usize).max(1);
        let mut entries = Vec::new();

        for (i, posting) in posting_list.iter().enumerate() {
            let skip_to = if (i + 1) % interval == 0 && i + interval < posting_list.len() {
                Some(i + interval)
            } else {
                None
            };
            entries.push(SkipEntry { doc_id: posting.doc_id, skip_to });
        }

        SkipList { entries, skip_interval: interval }
    }

    pub fn find(&self, target: DocId) -> Option<usize> {
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].doc_id >= target {
                return Some(i);
            }
            if let Some(skip_to) = self.entries[i].skip_to {
                if skip_to < self.entries.len() && self.entries[skip_to].doc_id <= target {
                    i = skip_to;
                    continue;
                }
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::posting::Posting;

    #[test]
    fn find_exact_and_absent() {
        let mut pl = PostingList::new(false, false);
        for id in [1u64, 3, 5, 7, 9] {
            pl.add_posting(Posting { doc_id: DocId(id), term_freq: 1, positions: vec![], field_norm: 1.0 }).unwrap();
        }
        let sl = SkipList::build(&pl);
        assert_eq!(sl.find(DocId(5)), Some(2));
        assert_eq!(sl.find(DocId(10)), None);
    }
}
