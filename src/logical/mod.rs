pub mod fieldmask;
pub mod kwic;
pub mod tuple;

pub use fieldmask::{FieldGroup, FieldMask};
pub use kwic::kwic_start_offset;
pub use tuple::{LogicalInterface, LogicalTuple, Projection};
