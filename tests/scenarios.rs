use std::path::PathBuf;

use sydney::core::config::InvertedConfig;
use sydney::core::types::{DatabaseId, DocId, RowId, UnitNumber};
use sydney::database::paths::{DatabasePaths, PathRegistry};
use sydney::delay::DelayIndexFile;

fn tok(text: &str, pos: u32) -> sydney::analysis::token::Token {
    sydney::analysis::token::Token::new(text.to_string(), pos, 0)
}

/// §8.5 S4: a deferred-delete entry with no backing posting anywhere is
/// flagged by `verify`, and `verify` still completes rather than aborting.
#[test]
fn s4_row_id_verify_inconsistency() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = DelayIndexFile::create(dir.path(), false, false, InvertedConfig::default()).unwrap();
    idx.insert(RowId(1), &[tok("apple", 0)]).unwrap();

    idx.delete_mut(0).assign_document_id(DocId(7), UnitNumber(0)).unwrap();

    let report = idx.verify().unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.inaccurate_rowids, vec![0]);
}

/// §8.5 S5: reserving an overlapping path under an already-reserved
/// database path fails, and the failing reservation leaves no trace in
/// the registry.
#[test]
fn s5_path_reservation_clash() {
    let registry = PathRegistry::new();

    let d1_paths = DatabasePaths { data: Some(PathBuf::from("/srv/a")), ..Default::default() };
    registry.reserve(DatabaseId(1), &d1_paths, false).unwrap();

    let d2_paths = DatabasePaths { data: Some(PathBuf::from("/srv/a/sub")), ..Default::default() };
    let err = registry.reserve(DatabaseId(2), &d2_paths, false);
    assert!(err.is_err());

    assert!(!registry.is_reserved(&PathBuf::from("/srv/a/sub")));
}
