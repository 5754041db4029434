pub mod daemon;
pub mod index;
pub mod info;

pub use daemon::MergeDaemon;
pub use index::{DelayIndexFile, VerifyReport};
pub use info::{InfoFile, Proceeding};
