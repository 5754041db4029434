pub mod dictionary;
pub mod docid_vector;
pub mod posting;
pub mod skiplist;
pub mod unit;

pub use dictionary::{Term, TermDictionary, TermInfo};
pub use docid_vector::DocIdVector;
pub use posting::{Posting, PostingList};
pub use unit::InvertedUnit;
