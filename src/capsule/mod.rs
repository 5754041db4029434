pub mod cluster;
pub mod retrieve;

pub use cluster::{Cluster, cluster_results};
pub use retrieve::{MatchMode, RowHit, SearchCapsule, SortOrder, UnitSignature};
