use std::sync::Arc;

use ocpp21_core::{
    format::{
        envelope::{NodeId, RoutingHeader},
        frame::CallError,
        message::{CallResponse, EncodeDecode, OcppMessage},
    },
    v21::protocol_error::ProtocolError,
};
use tokio_util::sync::CancellationToken;

use super::Csms;
use crate::v21::{
    events::{EventKind, GatewayEvent},
    interface::Channel,
};

impl Csms {
    /// A node finished its handshake. A later connection of the same node
    /// replaces this one.
    pub async fn on_connect(&self, node_id: NodeId, channel: &Arc<dyn Channel>) {
        let now = self.clock.now();
        self.registry.upsert(node_id.clone(), channel, now);
        log::info!("{} connected, {} nodes online", node_id, self.registry.len());
        self.hub
            .notify(GatewayEvent::new(EventKind::NodeConnected, node_id, now))
            .await;
    }

    /// Only forgets the node when `channel` is still the one registered for it.
    pub async fn on_close(&self, node_id: NodeId, channel: &Arc<dyn Channel>) -> bool {
        if !self.registry.remove_if_same(&node_id, channel) {
            log::debug!("{} closed a superseded connection", node_id);
            return false;
        }
        log::info!("{} disconnected", node_id);
        self.hub
            .notify(GatewayEvent::new(EventKind::NodeDisconnected, node_id, self.clock.now()))
            .await;
        true
    }

    /// Handles one text frame received from a node and returns the frame to
    /// write back, if any.
    pub async fn on_text(&self, header: RoutingHeader, text: String, cancel: CancellationToken) -> Option<String> {
        if let Some(source) = header.network_path.source() {
            self.registry.touch(source, self.clock.now());
        }
        log::info!("[MSG_IN] {}", text);
        let reply = match OcppMessage::<ProtocolError>::decode(text) {
            OcppMessage::Call(call) if &header.destination == self.node_id() => {
                self.inbound.dispatch(header, call, cancel).await?
            }
            OcppMessage::Call(call) => self.router.forward(header, call, cancel).await,
            OcppMessage::CallResponse(response) => {
                log::warn!("unsolicited response {}", response.get_unique_id());
                return None;
            }
            OcppMessage::CallResultError(err) => {
                log::warn!("invalid result reported for {}: {}", err.unique_id, err.error_code);
                return None;
            }
            OcppMessage::Send(send) => {
                log::debug!("{} {} needs no answer", send.action, send.unique_id);
                return None;
            }
            OcppMessage::Invalid(invalid) => {
                log::warn!("invalid frame: {}", invalid.err_msg);
                let unique_id = invalid.unique_id?;
                CallResponse::CallError(
                    CallError::new(unique_id, ProtocolError::FormatViolation).with_description(invalid.err_msg),
                )
            }
        };
        let reply = reply.encode();
        log::info!("[MSG_OUT] {}", reply);
        Some(reply)
    }
}
