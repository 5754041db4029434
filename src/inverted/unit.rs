use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::analysis::token::Token;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, RowId};
use crate::core::utils::levenshtein_distance;
use crate::inverted::dictionary::{Term, TermDictionary};
use crate::inverted::docid_vector::DocIdVector;
use crate::inverted::posting::{Posting, PostingList};
use crate::search::prefix::PrefixIndex;

/// One inverted index packaged from its four sub-files (spec §4.4):
/// dictionary, leaf/overflow posting storage (represented here by the
/// in-memory `postings` map; see DESIGN.md for this simplification), and
/// the doc-id vector. `nolocation`/`no_tf` are fixed at create time from
/// the table schema.
pub struct InvertedUnit {
    pub dictionary: TermDictionary,
    postings: HashMap<Term, PostingList>,
    pub doc_id_vector: DocIdVector,
    pub doc_count: usize,
    pub total_tokens: usize,
    pub no_location: bool,
    pub no_tf: bool,
    next_doc_id: u64,
    prefix_index: Option<PrefixIndex>,
    /// doc-id -> its terms, kept only to support the current-insert
    /// cheap-delete path (`remove_doc`) without re-tokenizing.
    doc_terms: HashMap<DocId, Vec<Term>>,
}

impl InvertedUnit {
    pub fn create<P: AsRef<Path>>(docid_path: P, no_location: bool, no_tf: bool) -> Result<Self> {
        Ok(InvertedUnit {
            dictionary: TermDictionary::new(),
            postings: HashMap::new(),
            doc_id_vector: DocIdVector::create(docid_path)?,
            doc_count: 0,
            total_tokens: 0,
            no_location,
            no_tf,
            next_doc_id: 0,
            prefix_index: None,
            doc_terms: HashMap::new(),
        })
    }

    /// Reopen an existing unit's doc-id vector, recovering the monotonic
    /// doc-id counter from its record count (one doc id assigned per
    /// insert). The in-memory dictionary/postings are not persisted in
    /// this implementation and start empty; see DESIGN.md.
    pub fn open<P: AsRef<Path>>(docid_path: P, no_location: bool, no_tf: bool) -> Result<Self> {
        let doc_id_vector = DocIdVector::open(docid_path)?;
        let next_doc_id = doc_id_vector.count() as u64;
        Ok(InvertedUnit {
            dictionary: TermDictionary::new(),
            postings: HashMap::new(),
            doc_id_vector,
            doc_count: next_doc_id as usize,
            total_tokens: 0,
            no_location,
            no_tf,
            next_doc_id,
            prefix_index: None,
            doc_terms: HashMap::new(),
        })
    }

    /// `insert(tokenizer, text, langs, row_id, ...)` (spec §4.4): tokenize,
    /// append doc-id into each term's posting list, update the doc-id
    /// vector, return the assigned doc id.
    pub fn insert(&mut self, row_id: RowId, tokens: &[Token]) -> Result<DocId> {
        let doc_id = DocId(self.next_doc_id);
        self.next_doc_id += 1;

        let mut term_positions: HashMap<Term, Vec<u32>> = HashMap::new();
        for token in tokens {
            term_positions.entry(Term::new(&token.text)).or_default().push(token.position);
        }

        let mut terms_seen = Vec::with_capacity(term_positions.len());
        for (term, positions) in term_positions {
            let term_freq = positions.len() as u32;
            let posting = Posting {
                doc_id,
                term_freq,
                positions,
                field_norm: 1.0 / (tokens.len().max(1) as f32).sqrt(),
            };
            let list = self.postings.entry(term.clone()).or_insert_with(|| PostingList::new(self.no_location, self.no_tf));
            list.add_posting(posting)?;
            self.dictionary.add_term(&term, list.doc_freq(), list.total_freq());
            terms_seen.push(term);
        }
        self.doc_terms.insert(doc_id, terms_seen);

        self.doc_id_vector.assign(row_id, doc_id, tokens.len() as u32)?;
        self.doc_count += 1;
        self.total_tokens += tokens.len();
        Ok(doc_id)
    }

    pub fn doc_id_for_row(&mut self, row_id: RowId) -> Result<Option<DocId>> {
        self.doc_id_vector.doc_id_of(row_id)
    }

    /// Cheap-delete path (spec §4.6): remove a document's postings directly
    /// from every term it appears under. Only valid while the document's
    /// only copy lives in a not-yet-merged current-insert unit.
    pub fn remove_doc(&mut self, doc_id: DocId) -> bool {
        match self.doc_terms.remove(&doc_id) {
            Some(terms) => {
                for term in terms {
                    if let Some(list) = self.postings.get_mut(&term) {
                        list.remove_doc(doc_id);
                    }
                }
                self.doc_count = self.doc_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    pub fn search_term(&self, term: &Term) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.postings.keys()
    }

    pub fn posting_list_mut(&mut self, term: &Term) -> &mut PostingList {
        self.postings.entry(term.clone()).or_insert_with(|| PostingList::new(self.no_location, self.no_tf))
    }

    /// `merge`: fold another unit's posting lists into this one,
    /// term-by-term (driven by `delay::index`'s `mergeList`).
    pub fn fold_term_from(&mut self, term: &Term, other: &PostingList) -> Result<()> {
        let list = self.posting_list_mut(term);
        list.fold_from(other)?;
        self.dictionary.add_term(term, list.doc_freq(), list.total_freq());
        Ok(())
    }

    /// Fold every document of `other` into `self`, renumbering doc ids to
    /// continue `self`'s own monotonic sequence and re-inserting the
    /// row-id -> doc-id mapping under the new id (spec §4.6.1's
    /// `mergeList`/`mergeVector`). Processing `other`'s documents in doc-id
    /// order keeps each term's postings monotonic in `self` too, since the
    /// new ids are assigned in that same order.
    pub fn fold_unit(&mut self, other: &mut InvertedUnit) -> Result<()> {
        let mut row_of: HashMap<DocId, (RowId, u32)> = HashMap::new();
        other.doc_id_vector.for_each(|row_id, doc_id, length| {
            row_of.insert(doc_id, (row_id, length));
        })?;

        let mut old_ids: Vec<DocId> = other.doc_terms.keys().copied().collect();
        old_ids.sort();

        for old_doc_id in old_ids {
            let terms = match other.doc_terms.get(&old_doc_id) {
                Some(t) => t.clone(),
                None => continue,
            };
            let new_doc_id = DocId(self.next_doc_id);
            self.next_doc_id += 1;

            for term in &terms {
                if let Some(old_list) = other.postings.get(term) {
                    if let Some(posting) = old_list.iter().find(|p| p.doc_id == old_doc_id) {
                        let mut new_posting = posting.clone();
                        new_posting.doc_id = new_doc_id;
                        let list = self.posting_list_mut(term);
                        list.add_posting(new_posting)?;
                        self.dictionary.add_term(term, list.doc_freq(), list.total_freq());
                    }
                }
            }
            self.doc_terms.insert(new_doc_id, terms);
            self.doc_count += 1;

            if let Some((row_id, length)) = row_of.get(&old_doc_id) {
                self.doc_id_vector.assign(*row_id, new_doc_id, *length)?;
            }
        }
        Ok(())
    }

    pub fn build_prefix_index(&mut self) -> Result<()> {
        let terms_with_freq: Vec<(String, u32)> = self
            .dictionary
            .term_map
            .keys()
            .map(|t| {
                let s = String::from_utf8_lossy(t.bytes()).to_string();
                let freq = self.dictionary.get_term_info(t).map(|i| i.doc_freq).unwrap_or(0);
                (s, freq)
            })
            .collect();
        let mut idx = PrefixIndex::new(1);
        idx.build(terms_with_freq.into_iter())?;
        self.prefix_index = Some(idx);
        Ok(())
    }

    pub fn prefix_search(&self, prefix: &str) -> Result<Vec<String>> {
        match &self.prefix_index {
            Some(idx) => Ok(idx.search_prefix(prefix)),
            None => Err(Error::new(ErrorKind::InvalidState, "prefix index not built".to_string())),
        }
    }

    pub fn wildcard_search(&self, pattern: &str) -> Result<Vec<String>> {
        let regex_pattern = pattern.replace('*', ".*").replace('?', ".");
        let regex = Regex::new(&regex_pattern)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("invalid wildcard: {}", e)))?;
        Ok(self
            .dictionary
            .term_map
            .keys()
            .map(|t| String::from_utf8_lossy(t.bytes()).to_string())
            .filter(|s| regex.is_match(s))
            .collect())
    }

    pub fn fuzzy_search(&self, term: &str, max_distance: u8, prefix_length: u8) -> Vec<(String, u8)> {
        let (prefix, suffix) = if prefix_length > 0 && term.len() >= prefix_length as usize {
            term.split_at(prefix_length as usize)
        } else {
            ("", term)
        };

        let mut matches: Vec<(String, u8)> = self
            .dictionary
            .term_map
            .keys()
            .filter_map(|t| {
                let s = String::from_utf8_lossy(t.bytes()).to_string();
                if !prefix.is_empty() && !s.starts_with(prefix) {
                    return None;
                }
                let dist = levenshtein_distance(suffix, &s[prefix.len()..]);
                (dist <= max_distance as usize).then_some((s, dist as u8))
            })
            .collect();
        matches.sort_by_key(|(_, d)| *d);
        matches
    }

    pub fn flush(&mut self) -> Result<()> {
        self.doc_id_vector.flush()
    }
}
