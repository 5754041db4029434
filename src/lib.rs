pub mod core;
pub mod analysis;
pub mod search;
pub mod compression;

pub mod page;
pub mod vector;
pub mod mainfile;
pub mod inverted;
pub mod expunge;
pub mod delay;
pub mod capsule;
pub mod logical;
pub mod database;
pub mod checkpoint;
pub mod registry;
pub mod external;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                                  SYDNEY STRUCT ARCHITECTURE                                  │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── PHYSICAL LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  page::PageFile ──fix/unfix──> page::Page (dirty-map + one-slot current cache)             │
│        │                                                                                    │
│        ├──backs──> vector::VectorFile      (keyed fixed-size array, null bitmap)           │
│        ├──backs──> vector::MultiVectorFile (several field layouts per key)                 │
│        └──backs──> mainfile::MainFile      (LRU cache, free list, verify/treatment)         │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── INDEX LAYER ───────────────────────────────────────────┐
│                                                                                              │
│  inverted::InvertedUnit ──contains──> inverted::TermDictionary ──maps──> inverted::Term     │
│        │                                   │                                                │
│        │                                   └──entries──> inverted::PostingList              │
│        │                                                        (compression::compress)     │
│        └──contains──> inverted::DocIdVector ──maps──> RowId <-> DocId                       │
│                                                                                              │
│  delay::DelayIndexFile: big unit + 2 insert sides + 2 expunge::ExpungeUnit delete sides,    │
│  coordinated by delay::InfoFile's current-bit / Proceeding state machine. begin_merge/       │
│  merge_list/merge_vector fold a frozen side into `big`; the merge daemon in                 │
│  delay::daemon drives this from should_merge() without caller involvement.                   │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── SEARCH LAYER ───────────────────────────────────────────┐
│                                                                                              │
│  capsule::SearchCapsule ──retrieves from──> big/insert0/insert1 sides of a DelayIndexFile    │
│        │                                                                                    │
│        ├──boolean modes──> Or/And/Add (setIntersection/setUnion over per-unit hits)         │
│        ├──per-unit entry──> execute_unit(signature, &mut result)                            │
│        └──feeds──> capsule::cluster::cluster_results (rough -> detailed -> cross-cluster)   │
│                                                                                              │
│  search::prefix::PrefixIndex: FST-backed prefix/wildcard lookups, independent of the above.  │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── LIFECYCLE LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  database::Database ──create/mount/unmount/move_paths/alter/drop_database/backup/recover    │
│        │                                                                                    │
│        ├──reserves──> database::paths::PathRegistry                                         │
│        ├──caches──> database::cache::DatabaseCache                                           │
│        ├──destroys via──> checkpoint::FileDestroyer (deferred one checkpoint)                │
│        └──renames backing files via──> mainfile::MainFile::rename / vector files             │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
