use std::sync::Arc;

use ocpp21_core::{
    format::envelope::{OcppResult, Request},
    v21::{
        messages::{
            change_availability::ChangeAvailabilityRequest,
            clear_cache::ClearCacheRequest,
            data_transfer::DataTransferRequest,
            request_start_transaction::RequestStartTransactionRequest,
            request_stop_transaction::RequestStopTransactionRequest,
            reset::{ResetRequest, ResetResponse},
            trigger_message::TriggerMessageRequest,
            unlock_connector::UnlockConnectorRequest,
        },
        types::{
            ChangeAvailabilityStatus, ClearCacheStatus, DataTransferStatus, Evse, IdToken, MessageTrigger,
            OperationalStatus, RequestStartStopStatus, ResetStatus, ResetType, TriggerMessageStatus, UnlockStatus,
        },
    },
};
use ocpp21_csms::v21::{GatewayConfig, SignaturePolicy, SignaturePolicyRule, SigningIdentity};
use serde_json::{json, Value};

use crate::harness::{
    channel::MockChannel,
    harness::{test_config, CsmsHarness},
};

struct Parties {
    csms: Arc<SigningIdentity>,
    station: Arc<SigningIdentity>,
}

impl Parties {
    fn new() -> Self {
        Self {
            csms: Arc::new(SigningIdentity::generate().with_name("csms")),
            station: Arc::new(SigningIdentity::generate().with_name("CS1")),
        }
    }

    /// CSMS signs what it sends and insists on signed answers from the station.
    fn csms_policy(&self) -> SignaturePolicy {
        SignaturePolicy::new("csms")
            .with_rule(SignaturePolicyRule::any().requests_only().sign_with(self.csms.clone()))
            .with_rule(SignaturePolicyRule::any().responses_only().require())
            .trust(self.station.verifying_key())
    }

    /// What the station enforces on the requests it receives.
    fn station_policy(&self) -> SignaturePolicy {
        SignaturePolicy::new("station")
            .with_rule(SignaturePolicyRule::any().requests_only().require())
            .trust(self.csms.verifying_key())
    }
}

fn station_answer(action: &str) -> Value {
    match action {
        "Reset" | "ChangeAvailability" | "TriggerMessage" | "ClearCache" | "RequestStopTransaction" => {
            json!({ "status": "Accepted" })
        }
        "UnlockConnector" => json!({ "status": "Unlocked" }),
        "RequestStartTransaction" => json!({ "status": "Accepted", "transactionId": "tx-17" }),
        "DataTransfer" => json!({ "status": "Accepted", "data": { "echo": [1, 2, 3] } }),
        other => panic!("station has no answer for {}", other),
    }
}

async fn signed_harness(parties: &Parties) -> (CsmsHarness, Arc<MockChannel>) {
    let h = CsmsHarness::new();
    h.csms.add_policy(parties.csms_policy());
    let station = MockChannel::signed_station(parties.station.clone(), parties.station_policy(), |call| {
        station_answer(&call.action)
    });
    h.connect("CS1", &station).await;
    (h, station)
}

fn assert_signed_by(station: &MockChannel, identity: &SigningIdentity) {
    let signatures = station.last_signatures();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].key_id, identity.key_id());
}

pub async fn every_outbound_action_round_trips_signed() {
    let parties = Parties::new();
    let (h, station) = signed_harness(&parties).await;
    let cancel = h.cancel.clone();

    let reset = h
        .csms
        .reset(
            Request::new(
                "CS1",
                ResetRequest {
                    kind: ResetType::OnIdle,
                    evse_id: Some(1),
                },
            ),
            cancel.clone(),
        )
        .await;
    assert_eq!(reset.result.payload().map(|r| r.status.clone()), Some(ResetStatus::Accepted));
    assert_eq!(reset.signatures[0].key_id, parties.station.key_id());
    assert_signed_by(&station, &parties.csms);

    let availability = h
        .csms
        .change_availability(
            Request::new(
                "CS1",
                ChangeAvailabilityRequest {
                    operational_status: OperationalStatus::Inoperative,
                    evse: Some(Evse {
                        id: 1,
                        connector_id: None,
                    }),
                },
            ),
            cancel.clone(),
        )
        .await;
    assert_eq!(
        availability.result.into_payload().map(|r| r.status),
        Some(ChangeAvailabilityStatus::Accepted)
    );

    let unlock = h
        .csms
        .unlock_connector(
            Request::new(
                "CS1",
                UnlockConnectorRequest {
                    evse_id: 1,
                    connector_id: 1,
                },
            ),
            cancel.clone(),
        )
        .await;
    assert_eq!(unlock.result.into_payload().map(|r| r.status), Some(UnlockStatus::Unlocked));

    let trigger = h
        .csms
        .trigger_message(
            Request::new(
                "CS1",
                TriggerMessageRequest {
                    requested_message: MessageTrigger::Heartbeat,
                    evse: None,
                    custom_trigger: None,
                },
            ),
            cancel.clone(),
        )
        .await;
    assert_eq!(trigger.result.into_payload().map(|r| r.status), Some(TriggerMessageStatus::Accepted));

    let clear = h.csms.clear_cache(Request::new("CS1", ClearCacheRequest {}), cancel.clone()).await;
    assert_eq!(clear.result.into_payload().map(|r| r.status), Some(ClearCacheStatus::Accepted));

    let start = h
        .csms
        .request_start_transaction(
            Request::new(
                "CS1",
                RequestStartTransactionRequest {
                    id_token: IdToken {
                        id_token: "04A2".into(),
                        kind: "ISO14443".into(),
                    },
                    remote_start_id: 7,
                    evse_id: Some(1),
                    group_id_token: None,
                },
            ),
            cancel.clone(),
        )
        .await;
    let start = start.result.into_payload().unwrap();
    assert_eq!(start.status, RequestStartStopStatus::Accepted);
    assert_eq!(start.transaction_id.as_deref(), Some("tx-17"));

    let stop = h
        .csms
        .request_stop_transaction(
            Request::new(
                "CS1",
                RequestStopTransactionRequest {
                    transaction_id: "tx-17".into(),
                },
            ),
            cancel.clone(),
        )
        .await;
    assert_eq!(stop.result.into_payload().map(|r| r.status), Some(RequestStartStopStatus::Accepted));

    let transfer = h
        .csms
        .data_transfer(
            Request::new(
                "CS1",
                DataTransferRequest {
                    vendor_id: "org.example".into(),
                    message_id: Some("ping".into()),
                    data: Some(json!({ "b": 1, "a": [true, null] })),
                },
            ),
            cancel,
        )
        .await;
    let transfer = transfer.result.into_payload().unwrap();
    assert_eq!(transfer.status, DataTransferStatus::Accepted);
    assert_eq!(transfer.data, Some(json!({ "echo": [1, 2, 3] })));

    assert_eq!(station.calls(), 8);
    assert_signed_by(&station, &parties.csms);
}

pub async fn station_rejects_unsigned_requests() {
    let parties = Parties::new();
    let h = CsmsHarness::new();
    let station = MockChannel::signed_station(parties.station.clone(), parties.station_policy(), |call| {
        station_answer(&call.action)
    });
    let _channel = h.connect("CS1", &station).await;

    let response = h.csms.clear_cache(Request::new("CS1", ClearCacheRequest {}), h.cancel.clone()).await;
    assert!(matches!(response.result, OcppResult::Protocol { .. }), "{:?}", response.result);
}

fn tampered_station(parties: &Parties) -> Arc<MockChannel> {
    MockChannel::tampering_station(parties.station.clone(), json!({ "status": "Accepted" }), |payload| {
        payload["status"] = json!("Rejected");
    })
}

pub async fn tampered_response_is_a_signature_error() {
    let parties = Parties::new();
    let h = CsmsHarness::new();
    h.csms.add_policy(parties.csms_policy());
    let station = tampered_station(&parties);
    let _channel = h.connect("CS1", &station).await;

    let response = h
        .csms
        .reset(
            Request::new(
                "CS1",
                ResetRequest {
                    kind: ResetType::Immediate,
                    evse_id: None,
                },
            ),
            h.cancel.clone(),
        )
        .await;
    assert!(matches!(response.result, OcppResult::SignatureError(_)), "{:?}", response.result);
}

pub async fn lenient_mode_keeps_tampered_response() {
    let parties = Parties::new();
    let h = CsmsHarness::with_config(GatewayConfig {
        strict_response_verification: false,
        ..test_config()
    });
    h.csms.add_policy(parties.csms_policy());
    let station = tampered_station(&parties);
    let _channel = h.connect("CS1", &station).await;

    let response = h
        .csms
        .reset(
            Request::new(
                "CS1",
                ResetRequest {
                    kind: ResetType::Immediate,
                    evse_id: None,
                },
            ),
            h.cancel.clone(),
        )
        .await;
    assert_eq!(
        response.result,
        OcppResult::Success(ResetResponse {
            status: ResetStatus::Rejected,
            status_info: None,
        })
    );
}

pub async fn missing_response_signature_is_rejected() {
    let parties = Parties::new();
    let h = CsmsHarness::new();
    h.csms.add_policy(parties.csms_policy());
    let station = MockChannel::responding(json!({ "status": "Accepted" }));
    let _channel = h.connect("CS1", &station).await;

    let response = h.csms.clear_cache(Request::new("CS1", ClearCacheRequest {}), h.cancel.clone()).await;
    match response.result {
        OcppResult::SignatureError(reason) => assert!(reason.contains("ClearCache"), "{}", reason),
        other => panic!("expected SignatureError, got {:?}", other),
    }
}

pub async fn resigning_replaces_own_entry() {
    let parties = Parties::new();
    let policy = parties.csms_policy();
    let mut request = Request::new("CS1", ClearCacheRequest {});
    let now = chrono::Utc::now();
    policy.sign_request(&mut request, now).unwrap();
    policy.sign_request(&mut request, now + chrono::Duration::seconds(5)).unwrap();
    assert_eq!(request.signatures.len(), 1);
    assert_eq!(request.signatures[0].timestamp, Some(now + chrono::Duration::seconds(5)));

    let other = SignaturePolicy::new("station").with_rule(SignaturePolicyRule::any().sign_with(parties.station.clone()));
    other.sign_request(&mut request, now).unwrap();
    assert_eq!(request.signatures.len(), 2);
    parties.station_policy().verify_request(&request).unwrap_err();

    // trusting both keys accepts the doubly signed request
    SignaturePolicy::new("both")
        .with_rule(SignaturePolicyRule::any().require())
        .trust(parties.csms.verifying_key())
        .trust(parties.station.verifying_key())
        .verify_request(&request)
        .unwrap();
}
