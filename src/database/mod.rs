pub mod attributes;
pub mod cache;
pub mod lifecycle;
pub mod paths;
pub mod sequence;

pub use attributes::DatabaseAttributes;
pub use cache::DatabaseCache;
pub use lifecycle::{Database, DatabaseStatus};
pub use paths::{DatabasePaths, PathCategory};
pub use sequence::ObjectIdSequence;
