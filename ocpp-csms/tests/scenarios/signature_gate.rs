use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ocpp21_core::{
    format::envelope::{OcppResult, Request},
    v21::{
        messages::authorize::{AuthorizeRequest, AuthorizeResponse},
        protocol_error::ProtocolError,
        types::{AuthorizationStatus, IdToken, IdTokenInfo},
    },
};
use ocpp21_csms::v21::{SignaturePolicy, SignaturePolicyRule, SigningIdentity};

use crate::harness::harness::{expect_error, expect_result, CsmsHarness};

fn authorize(token: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        id_token: IdToken {
            id_token: token.into(),
            kind: "ISO14443".into(),
        },
    }
}

/// Authorize handler whose only side effect is counting its invocations.
fn counted_authorize(h: &CsmsHarness) -> Arc<AtomicUsize> {
    let invoked = Arc::new(AtomicUsize::new(0));
    let inner = invoked.clone();
    h.csms.inbound().register::<AuthorizeRequest, _>(move |_| {
        inner.fetch_add(1, Ordering::SeqCst);
        AuthorizeResponse {
            id_token_info: IdTokenInfo {
                status: AuthorizationStatus::Accepted,
                cache_expiry_date_time: None,
            },
        }
    });
    invoked
}

fn station_signer(station: &Arc<SigningIdentity>) -> SignaturePolicy {
    SignaturePolicy::new("station").with_rule(SignaturePolicyRule::any().sign_with(station.clone()))
}

fn requiring_csms_policy(station: &Arc<SigningIdentity>) -> SignaturePolicy {
    SignaturePolicy::new("csms")
        .with_rule(SignaturePolicyRule::action("Authorize").requests_only().require())
        .trust(station.verifying_key())
}

pub async fn unsigned_request_never_reaches_logic() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    let station = Arc::new(SigningIdentity::generate());
    h.csms.add_policy(requiring_csms_policy(&station));

    let response = h.csms.inbound().process(h.inbound("CS1", authorize("04A2"))).await;
    assert!(matches!(response.result, OcppResult::SignatureError(_)));
    assert!(response.signatures.is_empty());
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    let (code, _) = expect_error(h.station_sends("CS1", &h.inbound("CS1", authorize("04A2"))).await);
    assert_eq!(code, ProtocolError::SecurityError);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

pub async fn signed_request_runs_logic_once() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    let station = Arc::new(SigningIdentity::generate());
    h.csms.add_policy(requiring_csms_policy(&station));

    let mut request = h.inbound("CS1", authorize("04A2"));
    station_signer(&station).sign_request(&mut request, h.clock.0).unwrap();
    assert_eq!(request.signatures.len(), 1);

    let response = h.csms.inbound().process(request.clone()).await;
    assert!(response.result.is_success(), "{:?}", response.result);
    assert_eq!(invoked.load(Ordering::SeqCst), 1);

    let answer: AuthorizeResponse = expect_result(h.station_sends("CS1", &request).await);
    assert_eq!(answer.id_token_info.status, AuthorizationStatus::Accepted);
    assert_eq!(invoked.load(Ordering::SeqCst), 2);
}

pub async fn tampered_request_is_rejected() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    let station = Arc::new(SigningIdentity::generate());
    h.csms.add_policy(requiring_csms_policy(&station));

    let mut request = h.inbound("CS1", authorize("04A2"));
    station_signer(&station).sign_request(&mut request, h.clock.0).unwrap();
    request.payload.id_token.id_token = "FFFF".into();

    let (code, _) = expect_error(h.station_sends("CS1", &request).await);
    assert_eq!(code, ProtocolError::SecurityError);
    let response = h.csms.inbound().process(request).await;
    assert!(matches!(response.result, OcppResult::SignatureError(_)));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

pub async fn untrusted_key_is_rejected() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    let station = Arc::new(SigningIdentity::generate());
    let intruder = Arc::new(SigningIdentity::generate());
    h.csms.add_policy(requiring_csms_policy(&station));

    let mut request: Request<AuthorizeRequest> = h.inbound("CS1", authorize("04A2"));
    station_signer(&intruder).sign_request(&mut request, h.clock.0).unwrap();

    let response = h.csms.inbound().process(request).await;
    match response.result {
        OcppResult::SignatureError(reason) => assert!(reason.contains(intruder.key_id()), "{}", reason),
        other => panic!("expected SignatureError, got {:?}", other),
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

pub async fn malformed_signature_entry_is_rejected() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    let station = Arc::new(SigningIdentity::generate());
    h.csms.add_policy(
        SignaturePolicy::new("csms")
            .with_rule(SignaturePolicyRule::action("Authorize").requests_only())
            .trust(station.verifying_key()),
    );

    let text = r#"[2,"m-1","Authorize",{"idToken":{"idToken":"04A2","type":"ISO14443"},"signatures":[{"keyId":42}]}]"#;
    let reply = h.send_text(h.header_from("CS1"), text).await.unwrap();
    assert!(reply.starts_with(r#"[4,"m-1","SecurityError""#), "{}", reply);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

pub async fn verify_if_present_accepts_unsigned() {
    let h = CsmsHarness::new();
    let invoked = counted_authorize(&h);
    h.csms.add_policy(SignaturePolicy::new("lenient"));

    let response = h.csms.inbound().process(h.inbound("CS1", authorize("04A2"))).await;
    assert!(response.result.is_success());
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
}

pub async fn responses_are_signed_by_the_csms() {
    let h = CsmsHarness::new();
    let csms_identity = Arc::new(SigningIdentity::generate().with_name("csms"));
    h.csms.add_policy(
        SignaturePolicy::new("csms").with_rule(SignaturePolicyRule::any().responses_only().sign_with(csms_identity.clone())),
    );

    let response = h.csms.inbound().process(h.inbound("CS1", authorize("04A2"))).await;
    assert!(response.result.is_success());
    assert_eq!(response.signatures.len(), 1);
    assert_eq!(response.signatures[0].key_id, csms_identity.key_id());
    assert_eq!(response.signatures[0].name.as_deref(), Some("csms"));

    // the station checks it against the csms key
    let station_view = SignaturePolicy::new("station")
        .with_rule(SignaturePolicyRule::any().responses_only().require())
        .trust(csms_identity.verifying_key());
    station_view.verify_response::<AuthorizeRequest>(&response).unwrap();
}
