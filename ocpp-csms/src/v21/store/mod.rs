mod charge_box;

pub use charge_box::{ChargeBox, ChargeBoxChange, ChargeBoxStore, CrudResult};
