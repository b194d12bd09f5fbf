pub mod signature_gate;
pub mod signed_exchange;
pub mod station_messages;
