pub mod reset;
pub mod storage;

pub use reset::{ResetCategory, ResetCause};
