pub mod file;
pub mod multi;
pub mod area;

pub use file::VectorFile;
pub use multi::{FieldLayout, MultiVectorFile};
pub use area::AreaVectorFile;
