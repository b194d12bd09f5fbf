use chrono::{DateTime, Utc};

use crate::v21::{protocol_error::ProtocolError, types::Signature};

/// Identifier of a networking node: a charging station, a local controller or the CSMS itself.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Hops a message has crossed so far, oldest first.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct NetworkPath(Vec<NodeId>);

impl NetworkPath {
    pub fn empty() -> Self {
        Self(Vec::new())
    }
    pub fn from_node(node: NodeId) -> Self {
        Self(vec![node])
    }
    pub fn append(&self, node: NodeId) -> Self {
        let mut hops = self.0.clone();
        hops.push(node);
        Self(hops)
    }
    pub fn source(&self) -> Option<&NodeId> {
        self.0.first()
    }
    pub fn last(&self) -> Option<&NodeId> {
        self.0.last()
    }
    pub fn contains(&self, node: &NodeId) -> bool {
        self.0.contains(node)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn hops(&self) -> &[NodeId] {
        &self.0
    }
}

impl core::fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let hops: Vec<&str> = self.0.iter().map(|n| n.as_str()).collect();
        write!(f, "{}", hops.join(" -> "))
    }
}

/// Routing metadata the transport carries next to every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingHeader {
    pub destination: NodeId,
    pub network_path: NetworkPath,
    pub event_tracking_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RoutingHeader {
    pub fn new(destination: NodeId, network_path: NetworkPath) -> Self {
        Self {
            destination,
            network_path,
            event_tracking_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Request<T> {
    pub request_id: String,
    pub destination: NodeId,
    pub network_path: NetworkPath,
    pub payload: T,
    pub signatures: Vec<Signature>,
    pub request_timestamp: DateTime<Utc>,
}

impl<T> Request<T> {
    pub fn new(destination: impl Into<NodeId>, payload: T) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            destination: destination.into(),
            network_path: NetworkPath::empty(),
            payload,
            signatures: Vec::new(),
            request_timestamp: Utc::now(),
        }
    }
    pub fn with_network_path(mut self, network_path: NetworkPath) -> Self {
        self.network_path = network_path;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OcppResult<T> {
    Success(T),
    SignatureError(String),
    UnknownOrUnreachable(NodeId),
    Timeout,
    /// Remote CALLERROR, or a response that could not be decoded.
    Protocol {
        code: ProtocolError,
        description: String,
    },
}

impl<T> OcppResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OcppResult::Success(_))
    }
    pub fn kind_name(&self) -> &'static str {
        match self {
            OcppResult::Success(_) => "Success",
            OcppResult::SignatureError(_) => "SignatureError",
            OcppResult::UnknownOrUnreachable(_) => "UnknownOrUnreachable",
            OcppResult::Timeout => "Timeout",
            OcppResult::Protocol { .. } => "Protocol",
        }
    }
    pub fn payload(&self) -> Option<&T> {
        match self {
            OcppResult::Success(t) => Some(t),
            _ => None,
        }
    }
    pub fn into_payload(self) -> Option<T> {
        match self {
            OcppResult::Success(t) => Some(t),
            _ => None,
        }
    }
    /// Error code and text used when the result has to travel as a CALLERROR.
    pub fn error_frame_parts(&self) -> Option<(ProtocolError, String)> {
        match self {
            OcppResult::Success(_) => None,
            OcppResult::SignatureError(reason) => Some((ProtocolError::SecurityError, reason.clone())),
            OcppResult::UnknownOrUnreachable(node) => Some((
                ProtocolError::GenericError,
                format!("Unknown or unreachable networking node '{}'", node),
            )),
            OcppResult::Timeout => Some((ProtocolError::GenericError, "Request timed out".into())),
            OcppResult::Protocol { code, description } => Some((code.clone(), description.clone())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Response<T> {
    pub request_id: String,
    pub network_path: NetworkPath,
    pub result: OcppResult<T>,
    pub signatures: Vec<Signature>,
    pub response_timestamp: DateTime<Utc>,
}

impl<T> Response<T> {
    pub fn new(request_id: String, network_path: NetworkPath, result: OcppResult<T>) -> Self {
        Self {
            request_id,
            network_path,
            result,
            signatures: Vec::new(),
            response_timestamp: Utc::now(),
        }
    }
    pub fn signature_error(request_id: String, network_path: NetworkPath, reason: impl Into<String>) -> Self {
        Self::new(request_id, network_path, OcppResult::SignatureError(reason.into()))
    }
    pub fn unknown_or_unreachable(request_id: String, network_path: NetworkPath, node: NodeId) -> Self {
        Self::new(request_id, network_path, OcppResult::UnknownOrUnreachable(node))
    }
    pub fn timeout(request_id: String, network_path: NetworkPath) -> Self {
        Self::new(request_id, network_path, OcppResult::Timeout)
    }
}
