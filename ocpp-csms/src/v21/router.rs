use std::{sync::Arc, time::Duration};

use ocpp21_core::{
    format::{
        canonical::{attach_signatures, split_signatures, to_canonical_bytes},
        envelope::{NetworkPath, NodeId, OcppResult, Request, Response, RoutingHeader},
        frame::{Call, CallError},
        message::CallResponse,
    },
    v21::{messages::OcppCall, protocol_error::ProtocolError, types::Signature},
};
use tokio_util::sync::CancellationToken;

use super::{
    config::GatewayConfig,
    error::{ChannelError, SignatureFault},
    events::{EventHub, EventKind, GatewayEvent},
    interface::{Channel, Clock},
    registry::NodeRegistry,
    signature::{SignaturePolicies, SignaturePolicy},
};

enum CallOutcome {
    Cancelled,
    TimedOut,
    Failed(ChannelError),
    Answered(CallResponse<ProtocolError>),
}

/// Sends requests to networking nodes through the channels of the registry.
pub struct MessageRouter {
    node_id: NodeId,
    registry: Arc<NodeRegistry>,
    policies: Arc<SignaturePolicies>,
    hub: Arc<EventHub>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    strict_response_verification: bool,
}

impl MessageRouter {
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<NodeRegistry>,
        policies: Arc<SignaturePolicies>,
        hub: Arc<EventHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            node_id: config.node_id.clone(),
            registry,
            policies,
            hub,
            clock,
            request_timeout: config.request_timeout(),
            strict_response_verification: config.strict_response_verification,
        }
    }

    /// Routing failure is checked first: an unknown destination never reaches
    /// the signing step and never touches a channel.
    pub async fn send<Req: OcppCall>(
        &self,
        mut request: Request<Req>,
        cancel: CancellationToken,
    ) -> Response<Req::Response> {
        let destination = request.destination.clone();
        let response_path = NetworkPath::from_node(destination.clone());

        let Some(channel) = self.registry.lookup(&destination) else {
            log::warn!("{} to {}: unknown or unreachable node", Req::ACTION, destination);
            return Response::unknown_or_unreachable(request.request_id, response_path, destination);
        };

        let policy = match self.policies.active() {
            Ok(policy) => policy,
            Err(e) => return Response::signature_error(request.request_id, response_path, e.to_string()),
        };
        if let Some(policy) = &policy {
            if let Err(e) = policy.sign_request(&mut request, self.clock.now()) {
                log::warn!("{} to {}: signing failed: {}", Req::ACTION, destination, e);
                return Response::signature_error(request.request_id, response_path, e.to_string());
            }
        }

        let mut payload = match serde_json::to_value(&request.payload) {
            Ok(payload) => payload,
            Err(e) => {
                return Response::new(
                    request.request_id,
                    response_path,
                    OcppResult::Protocol {
                        code: ProtocolError::FormatViolation,
                        description: e.to_string(),
                    },
                )
            }
        };
        attach_signatures(&mut payload, &request.signatures);

        let header = RoutingHeader::new(destination.clone(), request.network_path.append(self.node_id.clone()));
        let call = Call {
            unique_id: request.request_id.clone(),
            action: Req::ACTION.to_string(),
            payload: payload.clone(),
        };

        self.hub
            .notify(
                GatewayEvent::new(EventKind::RequestSent, destination.clone(), self.clock.now())
                    .with_message(Req::ACTION, &request.request_id, &header.network_path)
                    .with_payload(Some(payload)),
            )
            .await;

        log::info!("[MSG_OUT] {} {} -> {}", Req::ACTION, request.request_id, destination);
        let response = match self.call_channel(channel, header, call, &cancel).await {
            CallOutcome::Cancelled => {
                log::warn!("{} {} cancelled", Req::ACTION, request.request_id);
                Response::timeout(request.request_id.clone(), response_path)
            }
            CallOutcome::TimedOut => {
                log::warn!("{} {} timed out after {:?}", Req::ACTION, request.request_id, self.request_timeout);
                Response::timeout(request.request_id.clone(), response_path)
            }
            CallOutcome::Failed(ChannelError::Closed) => {
                Response::unknown_or_unreachable(request.request_id.clone(), response_path, destination.clone())
            }
            CallOutcome::Failed(e) => Response::new(
                request.request_id.clone(),
                response_path,
                OcppResult::Protocol {
                    code: ProtocolError::GenericError,
                    description: e.to_string(),
                },
            ),
            CallOutcome::Answered(frame) => {
                self.decode_response::<Req>(&request.request_id, response_path, frame, policy.as_deref())
            }
        };

        self.hub
            .notify(
                GatewayEvent::new(EventKind::ResponseReceived, destination, self.clock.now())
                    .with_message(Req::ACTION, &response.request_id, &response.network_path)
                    .with_payload(response.result.payload().and_then(|p| serde_json::to_value(p).ok()))
                    .with_outcome(response.result.kind_name()),
            )
            .await;

        response
    }

    /// Store-and-forward of a frame addressed to another node. The signatures
    /// travel untouched; only the network path grows by this hop.
    pub async fn forward(
        &self,
        header: RoutingHeader,
        call: Call,
        cancel: CancellationToken,
    ) -> CallResponse<ProtocolError> {
        let unique_id = call.unique_id.clone();
        let destination = header.destination.clone();
        let error = |code: ProtocolError, description: String| {
            CallResponse::CallError(CallError::new(unique_id.clone(), code).with_description(description))
        };

        if header.network_path.contains(&self.node_id) {
            log::warn!("{} {} already passed {}, dropping loop", call.action, unique_id, self.node_id);
            return error(ProtocolError::GenericError, format!("Routing loop towards '{}'", destination));
        }
        let Some(channel) = self.registry.lookup(&destination) else {
            log::warn!("cannot forward {} {}: unknown node {}", call.action, unique_id, destination);
            return error(
                ProtocolError::GenericError,
                format!("Unknown or unreachable networking node '{}'", destination),
            );
        };

        let header = RoutingHeader {
            network_path: header.network_path.append(self.node_id.clone()),
            ..header
        };
        let action = call.action.clone();
        self.hub
            .notify(
                GatewayEvent::new(EventKind::RequestSent, destination.clone(), self.clock.now())
                    .with_message(&action, &unique_id, &header.network_path)
                    .with_payload(Some(call.payload.clone())),
            )
            .await;

        log::debug!("forwarding {} {} via {}", action, unique_id, header.network_path);
        let response = match self.call_channel(channel, header.clone(), call, &cancel).await {
            CallOutcome::Answered(frame) => frame,
            CallOutcome::Cancelled | CallOutcome::TimedOut => {
                error(ProtocolError::GenericError, "Request timed out".into())
            }
            CallOutcome::Failed(e) => error(ProtocolError::GenericError, e.to_string()),
        };

        let outcome = match &response {
            CallResponse::CallResult(_) => "Success".to_string(),
            CallResponse::CallError(e) => e.error_code.to_string(),
        };
        self.hub
            .notify(
                GatewayEvent::new(EventKind::ResponseReceived, destination, self.clock.now())
                    .with_message(&action, &unique_id, &header.network_path)
                    .with_outcome(outcome),
            )
            .await;
        response
    }

    async fn call_channel(
        &self,
        channel: Arc<dyn Channel>,
        header: RoutingHeader,
        call: Call,
        cancel: &CancellationToken,
    ) -> CallOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => CallOutcome::Cancelled,
            res = tokio::time::timeout(self.request_timeout, channel.call(header, call, cancel.clone())) => match res {
                Err(_) => CallOutcome::TimedOut,
                Ok(Err(e)) => CallOutcome::Failed(e),
                Ok(Ok(frame)) => CallOutcome::Answered(frame),
            }
        }
    }

    fn decode_response<Req: OcppCall>(
        &self,
        request_id: &str,
        network_path: NetworkPath,
        frame: CallResponse<ProtocolError>,
        policy: Option<&SignaturePolicy>,
    ) -> Response<Req::Response> {
        let protocol = |code: ProtocolError, description: String| {
            Response::new(request_id.to_string(), network_path.clone(), OcppResult::Protocol { code, description })
        };

        if frame.get_unique_id() != request_id {
            return protocol(
                ProtocolError::RpcFrameworkError,
                format!("response id '{}' does not match request '{}'", frame.get_unique_id(), request_id),
            );
        }
        let mut payload = match frame {
            CallResponse::CallError(err) => {
                log::info!("[MSG_IN] {} {} error {}", Req::ACTION, request_id, err.error_code);
                return protocol(err.error_code, err.error_description);
            }
            CallResponse::CallResult(res) => res.payload,
        };
        log::info!("[MSG_IN] {} {} result", Req::ACTION, request_id);

        let parsed = split_signatures(&mut payload);
        let bytes = to_canonical_bytes(&payload);
        let typed = match serde_json::from_value::<Req::Response>(payload) {
            Ok(typed) => typed,
            Err(e) => return protocol(ProtocolError::FormatViolation, e.to_string()),
        };

        let malformed = parsed.iter().any(|s| s.is_none());
        let signatures: Vec<Signature> = parsed.into_iter().flatten().collect();
        let verification = if malformed {
            Err(SignatureFault::Malformed("unparseable signature entry".into()))
        } else {
            match policy {
                Some(policy) => policy.verify_response_message(Req::ACTION, &bytes, &signatures),
                None => Ok(()),
            }
        };

        let result = match verification {
            Ok(()) => OcppResult::Success(typed),
            Err(e) if self.strict_response_verification => {
                log::warn!("{} {}: response signature rejected: {}", Req::ACTION, request_id, e);
                OcppResult::SignatureError(e.to_string())
            }
            Err(e) => {
                log::warn!("{} {}: response signature invalid, kept for compatibility: {}", Req::ACTION, request_id, e);
                OcppResult::Success(typed)
            }
        };
        let mut response = Response::new(request_id.to_string(), network_path, result);
        response.signatures = signatures;
        response
    }
}
