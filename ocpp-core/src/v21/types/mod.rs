mod authorization_status;
mod boot_reason;
mod charging_station;
mod clear_cache_status;
mod connector_status;
mod data_transfer_status;
mod evse;
mod firmware_status;
mod id_token;
mod message_trigger;
mod meter_value;
mod operational_status;
mod registration_status;
mod request_start_stop_status;
mod reset;
mod signature;
mod status_info;
mod unlock_status;
mod upload_log_status;

pub use authorization_status::AuthorizationStatus;
pub use boot_reason::BootReason;
pub use charging_station::ChargingStation;
pub use clear_cache_status::ClearCacheStatus;
pub use connector_status::ConnectorStatus;
pub use data_transfer_status::DataTransferStatus;
pub use evse::Evse;
pub use firmware_status::FirmwareStatus;
pub use id_token::{IdToken, IdTokenInfo};
pub use message_trigger::{MessageTrigger, TriggerMessageStatus};
pub use meter_value::{MeterValue, SampledValue};
pub use operational_status::{ChangeAvailabilityStatus, OperationalStatus};
pub use registration_status::RegistrationStatus;
pub use request_start_stop_status::RequestStartStopStatus;
pub use reset::{ResetStatus, ResetType};
pub use signature::Signature;
pub use status_info::StatusInfo;
pub use unlock_status::UnlockStatus;
pub use upload_log_status::UploadLogStatus;
