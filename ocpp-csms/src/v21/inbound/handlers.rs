use std::sync::Arc;

use ocpp21_core::v21::{
    messages::{
        authorize::{AuthorizeRequest, AuthorizeResponse},
        boot_notification::{BootNotificationRequest, BootNotificationResponse},
        data_transfer::{DataTransferRequest, DataTransferResponse},
        firmware_status_notification::{FirmwareStatusNotificationRequest, FirmwareStatusNotificationResponse},
        heartbeat::{HeartbeatRequest, HeartbeatResponse},
        log_status_notification::{LogStatusNotificationRequest, LogStatusNotificationResponse},
        meter_values::{MeterValuesRequest, MeterValuesResponse},
        security_event_notification::{SecurityEventNotificationRequest, SecurityEventNotificationResponse},
        status_notification::{StatusNotificationRequest, StatusNotificationResponse},
    },
    types::{AuthorizationStatus, DataTransferStatus, IdTokenInfo, RegistrationStatus},
};
use serde_json::Value;

use super::InboundGateway;
use crate::v21::interface::Clock;

/// Installs the stock answers of a test CSMS: accept everything, tell the time,
/// and mirror data transfers back reversed.
pub fn default_handlers(gateway: &InboundGateway, clock: Arc<dyn Clock>, heartbeat_interval: i32) {
    let heartbeat_clock = clock.clone();
    gateway.register::<HeartbeatRequest, _>(move |_| HeartbeatResponse {
        current_time: heartbeat_clock.now(),
    });

    gateway.register::<BootNotificationRequest, _>(move |req| {
        log::info!(
            "boot of {} {} ({:?})",
            req.payload.charging_station.vendor_name,
            req.payload.charging_station.model,
            req.payload.reason
        );
        BootNotificationResponse {
            current_time: clock.now(),
            interval: heartbeat_interval,
            status: RegistrationStatus::Accepted,
            status_info: None,
        }
    });

    gateway.register::<AuthorizeRequest, _>(|_| AuthorizeResponse {
        id_token_info: IdTokenInfo {
            status: AuthorizationStatus::Accepted,
            cache_expiry_date_time: None,
        },
    });

    gateway.register::<DataTransferRequest, _>(|req| {
        if req.payload.vendor_id.is_empty() {
            return DataTransferResponse {
                status: DataTransferStatus::UnknownVendorId,
                status_info: None,
                data: None,
            };
        }
        DataTransferResponse {
            status: DataTransferStatus::Accepted,
            status_info: None,
            data: req.payload.data.as_ref().map(reverse_data),
        }
    });

    gateway.register::<StatusNotificationRequest, _>(|_| StatusNotificationResponse {});
    gateway.register::<MeterValuesRequest, _>(|_| MeterValuesResponse {});
    gateway.register::<FirmwareStatusNotificationRequest, _>(|_| FirmwareStatusNotificationResponse {});
    gateway.register::<LogStatusNotificationRequest, _>(|_| LogStatusNotificationResponse {});
    gateway.register::<SecurityEventNotificationRequest, _>(|req| {
        log::warn!("security event '{}' at {}", req.payload.kind, req.payload.timestamp);
        SecurityEventNotificationResponse {}
    });
}

fn reverse_data(data: &Value) -> Value {
    match data {
        Value::String(s) => Value::String(s.chars().rev().collect()),
        Value::Array(items) => Value::Array(items.iter().rev().map(reverse_data).collect()),
        other => other.clone(),
    }
}
