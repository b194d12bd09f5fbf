mod outgoing;
mod transport;

use std::sync::Arc;

use ocpp21_core::{
    format::envelope::{NodeId, Request, Response},
    v21::{messages::OcppCall, types::ChargingStation},
};
use tokio_util::sync::CancellationToken;

use super::{
    config::GatewayConfig,
    events::{EventHub, EventKind, GatewayEvent},
    inbound::{default_handlers, InboundGateway},
    interface::{ChargeBoxPersistence, Clock, NoPersistence, SystemClock},
    registry::NodeRegistry,
    router::MessageRouter,
    signature::{SignaturePolicies, SignaturePolicy},
    store::{ChargeBox, ChargeBoxStore, CrudResult},
};

/// One central system instance. Everything it needs is owned here, so several
/// instances can run side by side in one process.
pub struct Csms {
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
    registry: Arc<NodeRegistry>,
    policies: Arc<SignaturePolicies>,
    hub: Arc<EventHub>,
    router: MessageRouter,
    inbound: InboundGateway,
    store: Arc<ChargeBoxStore>,
}

impl Csms {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, Arc::new(NoPersistence))
    }

    pub fn with_persistence(
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
        persistence: Arc<dyn ChargeBoxPersistence>,
    ) -> Self {
        Self::build(config, clock, persistence)
    }

    fn build(config: GatewayConfig, clock: Arc<dyn Clock>, persistence: Arc<dyn ChargeBoxPersistence>) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        let policies = Arc::new(SignaturePolicies::new(config.policy_selection.clone()));
        let hub = Arc::new(EventHub::new());
        let store = Arc::new(ChargeBoxStore::with_persistence(
            config.lock_timeout(),
            clock.clone(),
            persistence,
        ));

        let router = MessageRouter::new(&config, registry.clone(), policies.clone(), hub.clone(), clock.clone());
        let inbound = InboundGateway::new(config.node_id.clone(), policies.clone(), hub.clone(), clock.clone());
        default_handlers(&inbound, clock.clone(), config.heartbeat_interval_secs);
        track_boots(&hub, store.clone());

        log::info!("csms {} ready, {} inbound actions", config.node_id, inbound.actions().len());
        Self {
            config,
            clock,
            registry,
            policies,
            hub,
            router,
            inbound,
            store,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.config.node_id
    }
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }
    pub fn policies(&self) -> &Arc<SignaturePolicies> {
        &self.policies
    }
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }
    pub fn inbound(&self) -> &InboundGateway {
        &self.inbound
    }
    pub fn store(&self) -> &Arc<ChargeBoxStore> {
        &self.store
    }

    pub fn add_policy(&self, policy: SignaturePolicy) {
        self.policies.add(policy);
    }

    /// Sends any supported request to a connected node.
    pub async fn send<Req: OcppCall>(&self, request: Request<Req>, cancel: CancellationToken) -> Response<Req::Response> {
        self.router.send(request, cancel).await
    }
}

/// Keeps the charge box catalog in step with the stations that boot.
fn track_boots(hub: &EventHub, store: Arc<ChargeBoxStore>) {
    hub.subscribe(EventKind::ResponseSent, move |event: GatewayEvent| {
        Box::pin(record_boot(store.clone(), event))
    });
}

async fn record_boot(store: Arc<ChargeBoxStore>, event: GatewayEvent) -> anyhow::Result<()> {
    if event.action.as_deref() != Some("BootNotification") || event.outcome.as_deref() != Some("Success") {
        return Ok(());
    }
    let Some(station) = event.request.as_ref().and_then(|p| p.get("chargingStation")) else {
        return Ok(());
    };
    let station: ChargingStation = serde_json::from_value(station.clone())?;
    let charge_box = ChargeBox::from_station(event.node_id.clone(), &station);
    match store.add_or_update(charge_box).await {
        CrudResult::Success(_) => Ok(()),
        CrudResult::Error(e) => Err(e),
        res => Err(anyhow::anyhow!("charge box {} not recorded: {}", event.node_id, res.kind_name())),
    }
}
