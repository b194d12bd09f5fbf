mod handlers;

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, RwLock},
};

use futures::future::BoxFuture;
use ocpp21_core::{
    format::{
        canonical::{attach_signatures, canonicalize, split_signatures, to_canonical_bytes},
        envelope::{NetworkPath, NodeId, OcppResult, Request, Response, RoutingHeader},
        frame::{Call, CallError, CallResult},
        message::CallResponse,
    },
    v21::{messages::OcppCall, protocol_error::ProtocolError, types::Signature},
};
use tokio_util::sync::CancellationToken;

pub use handlers::default_handlers;

use super::{
    error::SignatureFault,
    events::{EventHub, EventKind, GatewayEvent},
    interface::Clock,
    signature::SignaturePolicies,
};

struct TypedLogic<Req: OcppCall>(Box<dyn Fn(&Request<Req>) -> Req::Response + Send + Sync>);

type DispatchFn =
    for<'a> fn(&'a InboundGateway, RoutingHeader, Call) -> BoxFuture<'a, CallResponse<ProtocolError>>;

#[derive(Clone)]
struct Registration {
    logic: Arc<dyn Any + Send + Sync>,
    dispatch: DispatchFn,
}

/// Answers requests sent to this node: verify, run the domain logic, sign.
pub struct InboundGateway {
    node_id: NodeId,
    policies: Arc<SignaturePolicies>,
    hub: Arc<EventHub>,
    clock: Arc<dyn Clock>,
    handlers: RwLock<HashMap<&'static str, Registration>>,
}

impl InboundGateway {
    pub fn new(node_id: NodeId, policies: Arc<SignaturePolicies>, hub: Arc<EventHub>, clock: Arc<dyn Clock>) -> Self {
        Self {
            node_id,
            policies,
            hub,
            clock,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Installs (or replaces) the domain logic of one request type.
    pub fn register<Req, F>(&self, logic: F)
    where
        Req: OcppCall,
        F: Fn(&Request<Req>) -> Req::Response + Send + Sync + 'static,
    {
        let registration = Registration {
            logic: Arc::new(TypedLogic::<Req>(Box::new(logic))),
            dispatch: dispatch_frame::<Req>,
        };
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(Req::ACTION, registration);
    }

    pub fn is_registered(&self, action: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(action)
    }

    pub fn actions(&self) -> Vec<&'static str> {
        let mut actions: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        actions.sort();
        actions
    }

    /// Decodes and answers one CALL frame. `None` when cancelled before an
    /// answer was ready.
    pub async fn dispatch(
        &self,
        header: RoutingHeader,
        call: Call,
        cancel: CancellationToken,
    ) -> Option<CallResponse<ProtocolError>> {
        let registration = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(call.action.as_str())
            .cloned();
        let Some(registration) = registration else {
            log::warn!("no handler for {}", call.action);
            return Some(CallResponse::CallError(
                CallError::new(call.unique_id, ProtocolError::NotImplemented)
                    .with_description(format!("'{}' is not implemented", call.action)),
            ));
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = (registration.dispatch)(self, header, call) => Some(res),
        }
    }

    /// Runs the registered logic of `Req` on an already decoded request.
    pub async fn process<Req: OcppCall>(&self, request: Request<Req>) -> Response<Req::Response> {
        let canonical = canonicalize(&request.payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()));
        self.process_with(request, canonical).await
    }

    /// The one template every message type goes through, with caller supplied logic.
    pub async fn handle<Req, F>(&self, request: Request<Req>, logic: F) -> Response<Req::Response>
    where
        Req: OcppCall,
        F: FnOnce(&Request<Req>) -> Req::Response,
    {
        let canonical = canonicalize(&request.payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()));
        self.run(request, canonical, logic).await
    }

    async fn process_with<Req: OcppCall>(
        &self,
        request: Request<Req>,
        canonical: Result<Vec<u8>, SignatureFault>,
    ) -> Response<Req::Response> {
        let registration = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(Req::ACTION)
            .cloned();
        let logic = registration.and_then(|r| r.logic.downcast::<TypedLogic<Req>>().ok());
        match logic {
            Some(logic) => self.run(request, canonical, |req: &Request<Req>| (logic.0)(req)).await,
            None => Response::new(
                request.request_id,
                NetworkPath::from_node(self.node_id.clone()),
                OcppResult::Protocol {
                    code: ProtocolError::NotImplemented,
                    description: format!("'{}' is not implemented", Req::ACTION),
                },
            ),
        }
    }

    async fn run<Req, F>(
        &self,
        request: Request<Req>,
        canonical: Result<Vec<u8>, SignatureFault>,
        logic: F,
    ) -> Response<Req::Response>
    where
        Req: OcppCall,
        F: FnOnce(&Request<Req>) -> Req::Response,
    {
        let source = request
            .network_path
            .source()
            .cloned()
            .unwrap_or_else(|| NodeId::new("unknown"));
        let response_path = NetworkPath::from_node(self.node_id.clone());

        self.hub
            .notify(
                GatewayEvent::new(EventKind::RequestReceived, source.clone(), self.clock.now())
                    .with_message(Req::ACTION, &request.request_id, &request.network_path)
                    .with_payload(serde_json::to_value(&request.payload).ok()),
            )
            .await;

        let verification = self.policies.active().and_then(|policy| match policy {
            Some(policy) => {
                let bytes = canonical?;
                policy.verify_request_message(Req::ACTION, &bytes, &request.signatures)
            }
            None => canonical.map(|_| ()),
        });

        let mut verified_request = None;
        let mut response = match verification {
            Ok(()) => {
                verified_request = serde_json::to_value(&request.payload).ok();
                let payload = logic(&request);
                Response::new(request.request_id.clone(), response_path, OcppResult::Success(payload))
            }
            Err(e) => {
                log::warn!("{} {} from {}: {}", Req::ACTION, request.request_id, source, e);
                Response::signature_error(request.request_id.clone(), response_path, e.to_string())
            }
        };

        let signed = self
            .policies
            .active()
            .and_then(|policy| policy.map_or(Ok(()), |p| p.sign_response::<Req>(&mut response, self.clock.now())));
        if let Err(e) = signed {
            log::warn!("{} {}: signing response failed: {}", Req::ACTION, request.request_id, e);
            response.result = OcppResult::SignatureError(e.to_string());
            response.signatures.clear();
        }

        self.hub
            .notify(
                GatewayEvent::new(EventKind::ResponseSent, source, self.clock.now())
                    .with_message(Req::ACTION, &response.request_id, &response.network_path)
                    .with_payload(response.result.payload().and_then(|p| serde_json::to_value(p).ok()))
                    .with_request(verified_request)
                    .with_outcome(response.result.kind_name()),
            )
            .await;

        response
    }
}

fn dispatch_frame<'a, Req: OcppCall>(
    gateway: &'a InboundGateway,
    header: RoutingHeader,
    call: Call,
) -> BoxFuture<'a, CallResponse<ProtocolError>> {
    Box::pin(async move {
        let Call {
            unique_id, mut payload, ..
        } = call;

        let parsed = split_signatures(&mut payload);
        let canonical = if parsed.iter().any(|s| s.is_none()) {
            Err(SignatureFault::Malformed("unparseable signature entry".into()))
        } else {
            Ok(to_canonical_bytes(&payload))
        };
        let typed = match serde_json::from_value::<Req>(payload) {
            Ok(typed) => typed,
            Err(e) => {
                log::warn!("{} {}: {}", Req::ACTION, unique_id, e);
                return CallResponse::CallError(
                    CallError::new(unique_id, ProtocolError::FormatViolation).with_description(e.to_string()),
                );
            }
        };

        let request = Request {
            request_id: unique_id.clone(),
            destination: header.destination,
            network_path: header.network_path,
            payload: typed,
            signatures: parsed.into_iter().flatten().collect::<Vec<Signature>>(),
            request_timestamp: header.timestamp,
        };
        let response = gateway.process_with(request, canonical).await;
        encode_response(unique_id, response)
    })
}

pub(crate) fn encode_response<T: serde::Serialize>(
    unique_id: String,
    response: Response<T>,
) -> CallResponse<ProtocolError> {
    if let Some((code, description)) = response.result.error_frame_parts() {
        return CallResponse::CallError(CallError::new(unique_id, code).with_description(description));
    }
    let Some(payload) = response.result.payload() else {
        return CallResponse::CallError(CallError::new(unique_id, ProtocolError::InternalError));
    };
    match serde_json::to_value(payload) {
        Ok(mut payload) => {
            attach_signatures(&mut payload, &response.signatures);
            CallResponse::CallResult(CallResult { unique_id, payload })
        }
        Err(e) => CallResponse::CallError(
            CallError::new(unique_id, ProtocolError::InternalError).with_description(e.to_string()),
        ),
    }
}
