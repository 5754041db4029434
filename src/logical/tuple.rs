use crate::core::error::Result;
use crate::core::types::RowId;
use crate::delay::DelayIndexFile;

/// `(row_id, document, langs, section_offsets)` - the shape a
/// `DataArrayData` tuple is converted to and from (spec §4.8).
#[derive(Debug, Clone)]
pub struct LogicalTuple {
    pub row_id: RowId,
    pub document: String,
    pub langs: Vec<String>,
    pub section_offsets: Vec<u32>,
}

/// Which projection path `get()` uses, resolved from the open-option's
/// projection mask (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    BitSet,
    SearchResult,
    Word,
    Length,
    SearchByBitSet,
}

/// Binds the delayed inverted engine into the typed tuple world.
pub struct LogicalInterface {
    pub no_location: bool,
    pub no_tf: bool,
}

impl LogicalInterface {
    pub fn new(no_location: bool, no_tf: bool) -> Self {
        LogicalInterface { no_location, no_tf }
    }

    /// Inserts a tuple, tokenizing its document text (caller-provided
    /// tokens, since tokenization is an `analysis` concern outside this
    /// binding layer).
    pub fn insert(&self, index: &mut DelayIndexFile, tuple: &LogicalTuple, tokens: &[crate::analysis::token::Token]) -> Result<()> {
        index.insert(tuple.row_id, tokens)?;
        Ok(())
    }

    pub fn expunge(&self, index: &mut DelayIndexFile, row_id: RowId) -> Result<()> {
        index.expunge(row_id)
    }

    /// Resolves which projection path `get()` should take, given the
    /// open-option's projection mask bits (bit0=bitset, bit1=word,
    /// bit2=length; `search_by_bitset` is requested explicitly since it
    /// is not a stored-projection bit but a query-shape choice).
    pub fn resolve_projection(mask: u32, search_by_bitset: bool) -> Projection {
        if search_by_bitset {
            return Projection::SearchByBitSet;
        }
        if mask & 0b100 != 0 {
            Projection::Length
        } else if mask & 0b010 != 0 {
            Projection::Word
        } else if mask & 0b001 != 0 {
            Projection::BitSet
        } else {
            Projection::SearchResult
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_projection_prefers_explicit_search_by_bitset() {
        assert_eq!(LogicalInterface::resolve_projection(0b111, true), Projection::SearchByBitSet);
    }

    #[test]
    fn resolve_projection_falls_back_to_search_result() {
        assert_eq!(LogicalInterface::resolve_projection(0, false), Projection::SearchResult);
    }
}
