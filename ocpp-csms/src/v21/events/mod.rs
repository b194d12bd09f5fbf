mod hub;

use chrono::{DateTime, Utc};
use ocpp21_core::format::envelope::{NetworkPath, NodeId};
use serde_json::Value;

pub use hub::{EventHub, Subscriber};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestReceived,
    ResponseSent,
    RequestSent,
    ResponseReceived,
    NodeConnected,
    NodeDisconnected,
}

#[derive(Clone, Debug)]
pub struct GatewayEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub node_id: NodeId,
    pub network_path: NetworkPath,
    pub action: Option<String>,
    pub request_id: Option<String>,
    pub payload: Option<Value>,
    /// The request a `ResponseSent` answers, after it passed verification.
    pub request: Option<Value>,
    /// Result kind of the response, e.g. `Success` or `SignatureError`.
    pub outcome: Option<String>,
}

impl GatewayEvent {
    pub fn new(kind: EventKind, node_id: NodeId, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            node_id,
            network_path: NetworkPath::empty(),
            action: None,
            request_id: None,
            payload: None,
            request: None,
            outcome: None,
        }
    }
    pub fn with_message(mut self, action: &str, request_id: &str, network_path: &NetworkPath) -> Self {
        self.action = Some(action.to_string());
        self.request_id = Some(request_id.to_string());
        self.network_path = network_path.clone();
        self
    }
    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }
    pub fn with_request(mut self, request: Option<Value>) -> Self {
        self.request = request;
        self
    }
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}
