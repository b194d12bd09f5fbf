pub mod canonical;
pub mod envelope;
pub mod frame;
pub mod message;
