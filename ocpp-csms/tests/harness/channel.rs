use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use chrono::Utc;
use ocpp21_core::{
    format::{
        canonical::{attach_signatures, split_signatures, to_canonical_bytes},
        envelope::RoutingHeader,
        frame::{Call, CallError, CallResult},
        message::CallResponse,
    },
    v21::{protocol_error::ProtocolError, types::Signature},
};
use ocpp21_csms::v21::{Channel, ChannelError, SignaturePolicy, SigningIdentity};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub type Responder = Box<dyn Fn(&Call) -> Value + Send + Sync>;

pub enum Behaviour {
    Respond(Responder),
    /// Answers with a payload signed by the station, then applies `tamper` to it.
    Signed {
        identity: Arc<SigningIdentity>,
        responder: Responder,
        tamper: Option<Box<dyn Fn(&mut Value) + Send + Sync>>,
    },
    Error(ProtocolError),
    Hang,
    Closed,
}

/// Station side of a connection. Counts the calls it receives and keeps the
/// last header and frame for inspection.
pub struct MockChannel {
    behaviour: Behaviour,
    /// When set, requests are verified like a station would before answering.
    verifier: Option<SignaturePolicy>,
    calls: AtomicUsize,
    last: Mutex<Option<(RoutingHeader, Call)>>,
    open: AtomicBool,
}

impl MockChannel {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            verifier: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            open: AtomicBool::new(true),
        })
    }

    pub fn responding(payload: Value) -> Arc<Self> {
        Self::new(Behaviour::Respond(Box::new(move |_: &Call| payload.clone())))
    }

    pub fn with_responder(responder: impl Fn(&Call) -> Value + Send + Sync + 'static) -> Arc<Self> {
        Self::new(Behaviour::Respond(Box::new(responder)))
    }

    pub fn signed_station(
        identity: Arc<SigningIdentity>,
        verifier: SignaturePolicy,
        responder: impl Fn(&Call) -> Value + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Behaviour::Signed {
                identity,
                responder: Box::new(responder),
                tamper: None,
            },
            verifier: Some(verifier),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            open: AtomicBool::new(true),
        })
    }

    pub fn tampering_station(identity: Arc<SigningIdentity>, payload: Value, tamper: impl Fn(&mut Value) + Send + Sync + 'static) -> Arc<Self> {
        Self::new(Behaviour::Signed {
            identity,
            responder: Box::new(move |_: &Call| payload.clone()),
            tamper: Some(Box::new(tamper)),
        })
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(Behaviour::Hang)
    }

    pub fn closed() -> Arc<Self> {
        Self::new(Behaviour::Closed)
    }

    pub fn failing(code: ProtocolError) -> Arc<Self> {
        Self::new(Behaviour::Error(code))
    }

    pub fn as_channel(self: &Arc<Self>) -> Arc<dyn Channel> {
        self.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<(RoutingHeader, Call)> {
        self.last.lock().unwrap().clone()
    }

    pub fn last_signatures(&self) -> Vec<Signature> {
        let Some((_, call)) = self.last() else {
            return Vec::new();
        };
        let mut payload = call.payload;
        split_signatures(&mut payload).into_iter().flatten().collect()
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    fn answer(&self, call: &Call) -> CallResponse<ProtocolError> {
        if let Some(verifier) = &self.verifier {
            let mut payload = call.payload.clone();
            let signatures: Vec<Signature> = split_signatures(&mut payload).into_iter().flatten().collect();
            if let Err(e) = verifier.verify_request_message(&call.action, &to_canonical_bytes(&payload), &signatures) {
                return CallResponse::CallError(
                    CallError::new(call.unique_id.clone(), ProtocolError::SecurityError).with_description(e.to_string()),
                );
            }
        }
        let payload = match &self.behaviour {
            Behaviour::Respond(responder) => responder(call),
            Behaviour::Signed {
                identity,
                responder,
                tamper,
            } => {
                let mut payload = responder(call);
                let signature = identity.sign(&to_canonical_bytes(&payload), Utc::now());
                attach_signatures(&mut payload, &[signature]);
                if let Some(tamper) = tamper {
                    tamper(&mut payload);
                }
                payload
            }
            Behaviour::Error(code) => {
                return CallResponse::CallError(CallError::new(call.unique_id.clone(), code.clone()));
            }
            Behaviour::Hang | Behaviour::Closed => unreachable!(),
        };
        CallResponse::CallResult(CallResult {
            unique_id: call.unique_id.clone(),
            payload,
        })
    }
}

#[async_trait::async_trait]
impl Channel for MockChannel {
    async fn call(
        &self,
        header: RoutingHeader,
        call: Call,
        _cancel: CancellationToken,
    ) -> Result<CallResponse<ProtocolError>, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((header, call.clone()));
        match self.behaviour {
            Behaviour::Hang => futures::future::pending().await,
            Behaviour::Closed => Err(ChannelError::Closed),
            _ => Ok(self.answer(&call)),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
