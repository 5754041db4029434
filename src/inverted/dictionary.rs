use std::collections::HashMap;

use crate::core::error::{Error, ErrorKind, Result};

/// Term representation: a byte string (word-token or n-gram token, spec
/// §3.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term(Vec<u8>);

impl Term {
    pub fn new(text: &str) -> Self {
        Term(text.as_bytes().to_vec())
    }

    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.0).map_err(|_| Error::new(ErrorKind::Parse, "invalid UTF-8 in term".to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Term statistics (spec §4.4's dictionary B-tree payload).
#[derive(Debug, Clone)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub total_freq: u64,
    pub idf: f32,
    pub posting_offset: u64,
    pub posting_size: u32,
}

/// Dictionary: term keys -> posting-list head pointer (spec §4.4).
pub struct TermDictionary {
    pub term_infos: Vec<TermInfo>,
    pub term_map: HashMap<Term, usize>,
}

impl TermDictionary {
    pub fn new() -> Self {
        TermDictionary { term_infos: Vec::new(), term_map: HashMap::new() }
    }

    pub fn add_term(&mut self, term: &Term, doc_freq: u32, total_freq: u64) {
        if let Some(&idx) = self.term_map.get(term) {
            self.term_infos[idx].doc_freq = doc_freq;
            self.term_infos[idx].total_freq = total_freq;
        } else {
            let idx = self.term_infos.len();
            self.term_map.insert(term.clone(), idx);
            self.term_infos.push(TermInfo {
                doc_freq,
                total_freq,
                idf: 0.0,
                posting_offset: 0,
                posting_size: 0,
            });
        }
    }

    pub fn calculate_idf(&mut self, total_docs: usize) {
        for info in &mut self.term_infos {
            info.idf = ((total_docs as f32 + 1.0) / (info.doc_freq as f32 + 1.0)).ln();
        }
    }

    pub fn get_term_info(&self, term: &Term) -> Option<&TermInfo> {
        self.term_map.get(term).map(|&idx| &self.term_infos[idx])
    }

    pub fn len(&self) -> usize {
        self.term_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_infos.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.term_map.keys()
    }
}

impl Default for TermDictionary {
    fn default() -> Self {
        Self::new()
    }
}
