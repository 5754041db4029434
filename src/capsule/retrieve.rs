use std::collections::{HashMap, HashSet};

use crate::core::error::Result;
use crate::core::types::{DocId, RowId};
use crate::delay::DelayIndexFile;
use crate::inverted::dictionary::Term;

/// Result ordering for `SearchCapsule::execute` (spec §4.7). An absent sort
/// order is rewritten to `RowIdAsc` before fusion, both for the
/// single-unit and the multi-unit path (documented decision, DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    RowIdAsc,
    ScoreDesc,
    ScoreAsc,
}

/// Per-term match mode a query's `TermPool` is built under (spec §4.7.1).
/// `Or` keeps any document carrying at least one term; `And` keeps only
/// documents carrying every term (`setIntersection`); `Add` keeps the `Or`
/// membership but accumulates every matching term's score, same as a
/// weighted union (`setUnion` with per-term sequence numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Or,
    And,
    Add,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowHit {
    pub row_id: RowId,
    pub score: f32,
}

/// Identifies one of the three readable sub-units of a `DelayIndexFile` for
/// `execute_unit` (spec §4.7: `execute(signature, &result)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSignature {
    Big,
    Insert(usize),
}

/// Similarity threshold `cluster_results`'s detailed/cross-cluster passes
/// use when `execute`'s caller asks for clusters but does not hand in a
/// query-specific one; a simplification of `LocalClusteredLimit` (spec
/// §4.7.4), see DESIGN.md.
const DEFAULT_LOCAL_THRESHOLD: f32 = 0.8;

/// Per-unit retrieval plus cross-unit fusion over the five sides of a
/// `DelayIndexFile` (spec §4.7). Holds no state of its own; every call
/// borrows the index it is searching.
pub struct SearchCapsule;

/// A simple TF-based ranking, playing the same role the BM25 formula
/// plays in the teacher's scorer (k1=1.2, b=0.75) but computed directly
/// over this crate's posting representation rather than through a shared
/// `Scorer` trait, since the two posting types are not interchangeable.
fn bm25_like(term_freq: u32, doc_freq: u32, total_docs: usize, doc_len: u32, avg_len: f32) -> f32 {
    const K1: f32 = 1.2;
    const B: f32 = 0.75;
    let idf = ((total_docs as f32 - doc_freq as f32 + 0.5) / (doc_freq as f32 + 0.5) + 1.0).ln();
    let len_norm = if avg_len > 0.0 { doc_len as f32 / avg_len } else { 1.0 };
    let tf = term_freq as f32;
    idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * len_norm))
}

impl SearchCapsule {
    /// `execute(limit, sort, &nTerm, &result, &clusters)`: OR/AND/ADD
    /// retrieval across the three readable sub-units (big, insert0,
    /// insert1), honoring the expunged-doc filter for each (spec §4.7.2).
    /// When `clusters` is supplied and `sort` is a ranked order, the
    /// composed hits are run through `cluster::cluster_results` before
    /// returning, same as the spec's `&clusters` out-parameter.
    pub fn execute(
        index: &mut DelayIndexFile,
        terms: &[&str],
        limit: usize,
        sort: SortOrder,
        mode: MatchMode,
        clusters: Option<&mut Vec<crate::capsule::cluster::Cluster>>,
    ) -> Result<Vec<RowHit>> {
        let excluded_big = Self::expunged_big_doc_ids(index)?;

        let mut hits: Vec<RowHit> = Vec::new();
        hits.extend(Self::retrieve_unit(&mut index.big, terms, &excluded_big, mode)?);
        hits.extend(Self::retrieve_unit(index.insert_mut(0), terms, &HashSet::new(), mode)?);
        hits.extend(Self::retrieve_unit(index.insert_mut(1), terms, &HashSet::new(), mode)?);

        let mut hits = Self::compose(hits, limit, sort)?;

        if let Some(out_clusters) = clusters {
            if sort == SortOrder::RowIdAsc {
                out_clusters.clear();
            } else {
                let config = index.merge_config();
                *out_clusters = crate::capsule::cluster::cluster_results(
                    &mut hits,
                    config.max_rough_cluster_count,
                    config.merge_cluster_distance,
                    DEFAULT_LOCAL_THRESHOLD,
                    false,
                );
            }
        }

        Ok(hits)
    }

    /// `execute(limit, sort, &wordSet)`: word-list retrieval for ranked
    /// search (spec §4.7). Words arrive already split (no free-text parse
    /// step), so this is `execute` under the ranked `Add` mode.
    pub fn execute_words(index: &mut DelayIndexFile, words: &[&str], limit: usize, sort: SortOrder) -> Result<Vec<RowHit>> {
        Self::execute(index, words, limit, sort, MatchMode::Add, None)
    }

    /// `execute(signature, &result)`: enumerate every row-id of exactly one
    /// sub-unit, honoring the same expunged-doc filter `execute` applies to
    /// that unit (spec §4.7). Used by verify and by clustering preparation.
    pub fn execute_unit(index: &mut DelayIndexFile, signature: UnitSignature, result: &mut Vec<RowId>) -> Result<()> {
        result.clear();
        match signature {
            UnitSignature::Big => {
                let excluded = Self::expunged_big_doc_ids(index)?;
                index.big.doc_id_vector.for_each(|row_id, doc_id, _| {
                    if !excluded.contains(&doc_id) {
                        result.push(row_id);
                    }
                })?;
            }
            UnitSignature::Insert(side) => {
                index.insert_mut(side).doc_id_vector.for_each(|row_id, _, _| {
                    result.push(row_id);
                })?;
            }
        }
        Ok(())
    }

    /// `getEstimateCount()` (spec §4.7): a cheap upper bound on how many
    /// rows a query could match, summing each term's `doc_freq` across the
    /// three sub-units without resolving row-ids or scores.
    pub fn get_estimate_count(index: &mut DelayIndexFile, terms: &[&str]) -> usize {
        let mut total = 0usize;
        for term_str in terms {
            let term = Term::new(term_str);
            if let Some(list) = index.big.search_term(&term) {
                total += list.doc_freq() as usize;
            }
            if let Some(list) = index.insert_mut(0).search_term(&term) {
                total += list.doc_freq() as usize;
            }
            if let Some(list) = index.insert_mut(1).search_term(&term) {
                total += list.doc_freq() as usize;
            }
        }
        total
    }

    /// `getCluster(...)` (spec §4.7.4): runs `cluster::cluster_results` over
    /// an already score-sorted hit list using the index's configured
    /// clustering thresholds.
    pub fn get_cluster(
        index: &DelayIndexFile,
        hits: &mut [RowHit],
        local_threshold: f32,
        phased: bool,
    ) -> Vec<crate::capsule::cluster::Cluster> {
        let config = index.merge_config();
        crate::capsule::cluster::cluster_results(
            hits,
            config.max_rough_cluster_count,
            config.merge_cluster_distance,
            local_threshold,
            phased,
        )
    }

    /// `getSearchTermList(...)` (spec §4.7): normalizes raw query terms the
    /// same way the per-unit lookup does, so a caller can report back
    /// exactly what was searched.
    pub fn get_search_term_list(terms: &[&str]) -> Vec<String> {
        terms.iter().filter_map(|t| Term::new(t).as_str().ok().map(str::to_string)).collect()
    }

    fn expunged_big_doc_ids(index: &mut DelayIndexFile) -> Result<HashSet<DocId>> {
        let mut excluded = HashSet::new();
        for side in 0..2 {
            let mut pending = Vec::new();
            index.delete_mut(side).get_all(&mut pending)?;
            for small in pending {
                if let Ok((doc_id, _unit)) = index.delete_mut(side).convert_to_big_document_id(small.0) {
                    excluded.insert(doc_id);
                }
            }
        }
        Ok(excluded)
    }

    fn retrieve_unit(
        unit: &mut crate::inverted::unit::InvertedUnit,
        terms: &[&str],
        excluded: &HashSet<DocId>,
        mode: MatchMode,
    ) -> Result<Vec<RowHit>> {
        let total_docs = unit.doc_count.max(1);
        let avg_len = if unit.doc_count > 0 { unit.total_tokens as f32 / unit.doc_count as f32 } else { 0.0 };

        let mut scores: HashMap<DocId, f32> = HashMap::new();
        let mut matched_terms: HashMap<DocId, HashSet<usize>> = HashMap::new();
        for (term_idx, term) in terms.iter().enumerate() {
            let term = Term::new(term);
            if let Some(list) = unit.search_term(&term) {
                let doc_freq = list.doc_freq();
                for posting in list.iter() {
                    if excluded.contains(&posting.doc_id) {
                        continue;
                    }
                    let doc_len = unit.doc_id_vector.length_of(Self::row_for(unit, posting.doc_id)?.unwrap_or(RowId(0)))?.unwrap_or(1);
                    let s = bm25_like(posting.term_freq, doc_freq, total_docs, doc_len, avg_len);
                    *scores.entry(posting.doc_id).or_insert(0.0) += s;
                    matched_terms.entry(posting.doc_id).or_default().insert(term_idx);
                }
            }
        }

        let mut hits = Vec::with_capacity(scores.len());
        for (doc_id, score) in scores {
            if mode == MatchMode::And {
                let matched = matched_terms.get(&doc_id).map(|s| s.len()).unwrap_or(0);
                if matched < terms.len() {
                    continue;
                }
            }
            if let Some(row_id) = Self::row_for(unit, doc_id)? {
                hits.push(RowHit { row_id, score });
            }
        }
        Ok(hits)
    }

    fn row_for(unit: &mut crate::inverted::unit::InvertedUnit, doc_id: DocId) -> Result<Option<RowId>> {
        let mut found = None;
        unit.doc_id_vector.for_each(|row_id, d, _| {
            if d == doc_id && found.is_none() {
                found = Some(row_id);
            }
        })?;
        Ok(found)
    }

    /// `SearchResultSet::compose` (spec §4.7.3), simplified: this crate's
    /// five-side anchor/union scheme collapses to a plain merge-then-sort
    /// since per-unit result sets here are already small enough that the
    /// anchor optimization buys nothing; behavior (final order and
    /// truncation rule) matches the spec.
    fn compose(mut hits: Vec<RowHit>, limit: usize, sort: SortOrder) -> Result<Vec<RowHit>> {
        match sort {
            SortOrder::RowIdAsc => hits.sort_by_key(|h| h.row_id),
            SortOrder::ScoreDesc => hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)),
            SortOrder::ScoreAsc => {
                hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
                if hits.len() > limit {
                    // leading rows are dropped: score addition through
                    // fusion can only raise a row's rank (spec §4.7.3).
                    let drop = hits.len() - limit;
                    hits.drain(0..drop);
                }
                return Ok(hits);
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;
    use crate::core::config::InvertedConfig;

    fn tok(text: &str, pos: u32) -> Token {
        Token::new(text.to_string(), pos, 0)
    }

    fn sample_index(dir: &tempfile::TempDir) -> DelayIndexFile {
        let mut idx = DelayIndexFile::create(dir.path(), false, false, InvertedConfig::default()).unwrap();
        idx.insert(RowId(1), &[tok("apple", 0), tok("pie", 1)]).unwrap();
        idx.insert(RowId(2), &[tok("apple", 0)]).unwrap();
        idx.insert(RowId(3), &[tok("banana", 0)]).unwrap();
        idx
    }

    #[test]
    fn or_mode_returns_any_term_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = sample_index(&dir);
        let hits = SearchCapsule::execute(&mut idx, &["apple", "banana"], 10, SortOrder::RowIdAsc, MatchMode::Or, None).unwrap();
        let rows: HashSet<RowId> = hits.iter().map(|h| h.row_id).collect();
        assert_eq!(rows, [RowId(1), RowId(2), RowId(3)].into_iter().collect());
    }

    #[test]
    fn and_mode_requires_every_term() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = sample_index(&dir);
        let hits = SearchCapsule::execute(&mut idx, &["apple", "pie"], 10, SortOrder::RowIdAsc, MatchMode::And, None).unwrap();
        let rows: Vec<RowId> = hits.iter().map(|h| h.row_id).collect();
        assert_eq!(rows, vec![RowId(1)]);
    }

    #[test]
    fn execute_populates_clusters_for_ranked_sort() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = sample_index(&dir);
        let mut clusters = Vec::new();
        let hits = SearchCapsule::execute(
            &mut idx,
            &["apple", "banana"],
            10,
            SortOrder::ScoreDesc,
            MatchMode::Or,
            Some(&mut clusters),
        )
        .unwrap();
        assert!(!clusters.is_empty());
        assert_eq!(clusters.iter().map(|c| c.len).sum::<usize>(), hits.len());
    }

    #[test]
    fn execute_unit_enumerates_one_sub_unit() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = sample_index(&dir);
        let mut result = Vec::new();
        SearchCapsule::execute_unit(&mut idx, UnitSignature::Insert(0), &mut result).unwrap();
        let rows: HashSet<RowId> = result.into_iter().collect();
        assert_eq!(rows, [RowId(1), RowId(2), RowId(3)].into_iter().collect());
    }

    #[test]
    fn get_estimate_count_sums_doc_freq() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = sample_index(&dir);
        assert_eq!(SearchCapsule::get_estimate_count(&mut idx, &["apple"]), 2);
        assert_eq!(SearchCapsule::get_estimate_count(&mut idx, &["banana"]), 1);
    }

    #[test]
    fn get_search_term_list_normalizes_terms() {
        assert_eq!(SearchCapsule::get_search_term_list(&["apple", "pie"]), vec!["apple".to_string(), "pie".to_string()]);
    }
}
