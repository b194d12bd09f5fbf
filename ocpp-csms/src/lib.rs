pub mod v21;
