use core::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

pub mod authorize;
pub mod boot_notification;
pub mod change_availability;
pub mod clear_cache;
pub mod data_transfer;
pub mod firmware_status_notification;
pub mod heartbeat;
pub mod log_status_notification;
pub mod meter_values;
pub mod request_start_transaction;
pub mod request_stop_transaction;
pub mod reset;
pub mod security_event_notification;
pub mod status_notification;
pub mod trigger_message;
pub mod unlock_connector;

/// Binds a request payload to its action name and response payload.
pub trait OcppCall: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    const ACTION: &'static str;
    type Response: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static;
}

macro_rules! ocpp_call {
    ($($action:literal => $req:ty, $res:ty;)+) => {
        $(
            impl OcppCall for $req {
                const ACTION: &'static str = $action;
                type Response = $res;
            }
        )+
    };
}

ocpp_call! {
    "Authorize" => authorize::AuthorizeRequest, authorize::AuthorizeResponse;
    "BootNotification" => boot_notification::BootNotificationRequest, boot_notification::BootNotificationResponse;
    "ChangeAvailability" => change_availability::ChangeAvailabilityRequest, change_availability::ChangeAvailabilityResponse;
    "ClearCache" => clear_cache::ClearCacheRequest, clear_cache::ClearCacheResponse;
    "DataTransfer" => data_transfer::DataTransferRequest, data_transfer::DataTransferResponse;
    "FirmwareStatusNotification" => firmware_status_notification::FirmwareStatusNotificationRequest, firmware_status_notification::FirmwareStatusNotificationResponse;
    "Heartbeat" => heartbeat::HeartbeatRequest, heartbeat::HeartbeatResponse;
    "LogStatusNotification" => log_status_notification::LogStatusNotificationRequest, log_status_notification::LogStatusNotificationResponse;
    "MeterValues" => meter_values::MeterValuesRequest, meter_values::MeterValuesResponse;
    "RequestStartTransaction" => request_start_transaction::RequestStartTransactionRequest, request_start_transaction::RequestStartTransactionResponse;
    "RequestStopTransaction" => request_stop_transaction::RequestStopTransactionRequest, request_stop_transaction::RequestStopTransactionResponse;
    "Reset" => reset::ResetRequest, reset::ResetResponse;
    "SecurityEventNotification" => security_event_notification::SecurityEventNotificationRequest, security_event_notification::SecurityEventNotificationResponse;
    "StatusNotification" => status_notification::StatusNotificationRequest, status_notification::StatusNotificationResponse;
    "TriggerMessage" => trigger_message::TriggerMessageRequest, trigger_message::TriggerMessageResponse;
    "UnlockConnector" => unlock_connector::UnlockConnectorRequest, unlock_connector::UnlockConnectorResponse;
}
