use std::sync::Arc;

use chrono::{TimeZone, Utc};
use ocpp21_core::{
    format::envelope::{OcppResult, Request},
    v21::{
        messages::{
            authorize::AuthorizeRequest,
            boot_notification::BootNotificationRequest,
            data_transfer::DataTransferRequest,
            firmware_status_notification::FirmwareStatusNotificationRequest,
            heartbeat::HeartbeatRequest,
            log_status_notification::LogStatusNotificationRequest,
            meter_values::MeterValuesRequest,
            security_event_notification::SecurityEventNotificationRequest,
            status_notification::StatusNotificationRequest,
            OcppCall,
        },
        types::{
            BootReason, ChargingStation, ConnectorStatus, FirmwareStatus, IdToken, MeterValue, SampledValue,
            UploadLogStatus,
        },
    },
};
use ocpp21_csms::v21::{SignaturePolicy, SignaturePolicyRule, SigningIdentity};
use serde_json::json;

use crate::harness::harness::{expect_result, CsmsHarness};

struct SignedStation {
    h: CsmsHarness,
    station: SignaturePolicy,
    station_view: SignaturePolicy,
}

impl SignedStation {
    fn new() -> Self {
        let station = Arc::new(SigningIdentity::generate());
        let csms = Arc::new(SigningIdentity::generate());
        let h = CsmsHarness::new();
        h.csms.add_policy(
            SignaturePolicy::new("csms")
                .with_rule(SignaturePolicyRule::any().requests_only().require())
                .with_rule(SignaturePolicyRule::any().responses_only().sign_with(csms.clone()))
                .trust(station.verifying_key()),
        );
        Self {
            h,
            station: SignaturePolicy::new("station").with_rule(SignaturePolicyRule::any().sign_with(station)),
            station_view: SignaturePolicy::new("station-view")
                .with_rule(SignaturePolicyRule::any().require())
                .trust(csms.verifying_key()),
        }
    }

    /// Signs `payload` as the station, checks it the way the CSMS would, then
    /// sends it both as a typed request and as a text frame.
    async fn exchange<Req: OcppCall>(&self, payload: Req) {
        let mut request: Request<Req> = self.h.inbound("CS1", payload);
        self.station.sign_request(&mut request, self.h.clock.0).unwrap();

        let response = self.h.csms.inbound().process(request.clone()).await;
        assert!(matches!(response.result, OcppResult::Success(_)), "{}: {:?}", Req::ACTION, response.result);
        self.station_view.verify_response::<Req>(&response).unwrap();

        let _: Req::Response = expect_result(self.h.station_sends("CS1", &request).await);
    }
}

pub async fn every_station_message_round_trips_signed() {
    let s = SignedStation::new();
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();

    s.exchange(HeartbeatRequest {}).await;
    s.exchange(BootNotificationRequest {
        charging_station: ChargingStation {
            serial_number: None,
            model: "Wallbox".into(),
            vendor_name: "ACME".into(),
            firmware_version: Some("1.2.3".into()),
        },
        reason: BootReason::Watchdog,
    })
    .await;
    s.exchange(AuthorizeRequest {
        id_token: IdToken {
            id_token: "04A2".into(),
            kind: "ISO14443".into(),
        },
    })
    .await;
    s.exchange(StatusNotificationRequest {
        timestamp: at,
        connector_status: ConnectorStatus::Occupied,
        evse_id: 1,
        connector_id: 1,
    })
    .await;
    s.exchange(MeterValuesRequest {
        evse_id: 1,
        meter_value: vec![MeterValue {
            timestamp: at,
            sampled_value: vec![
                SampledValue {
                    value: 99156.34123953269,
                    measurand: Some("Energy.Active.Import.Register".into()),
                    phase: None,
                    location: None,
                },
                SampledValue {
                    value: 0.1 + 0.2,
                    measurand: Some("Power.Active.Import".into()),
                    phase: None,
                    location: None,
                },
                SampledValue {
                    value: 7.0,
                    measurand: Some("Current.Import".into()),
                    phase: Some("L1".into()),
                    location: Some("Outlet".into()),
                },
            ],
        }],
    })
    .await;
    s.exchange(DataTransferRequest {
        vendor_id: "org.example".into(),
        message_id: Some("m".into()),
        data: Some(json!({ "nested": { "z": "last", "a": "first" } })),
    })
    .await;
    s.exchange(FirmwareStatusNotificationRequest {
        status: FirmwareStatus::Installed,
        request_id: Some(3),
    })
    .await;
    s.exchange(LogStatusNotificationRequest {
        status: UploadLogStatus::Uploaded,
        request_id: None,
    })
    .await;
    s.exchange(SecurityEventNotificationRequest {
        kind: "TamperDetectionActivated".into(),
        timestamp: at,
        tech_info: Some("lid opened".into()),
    })
    .await;

    assert_eq!(s.h.csms.store().count(), 1);
}
