pub mod format;
pub mod v21;
