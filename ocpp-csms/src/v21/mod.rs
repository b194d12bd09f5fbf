mod config;
mod csms;
mod error;
mod events;
mod inbound;
mod interface;
mod registry;
mod router;
mod signature;
mod store;

pub use {
    config::{GatewayConfig, PolicySelection},
    csms::Csms,
    error::{ChannelError, ConfigError, SignatureFault},
    events::{EventHub, EventKind, GatewayEvent, Subscriber},
    inbound::{InboundGateway, default_handlers},
    interface::{Channel, ChargeBoxPersistence, Clock, NoPersistence, SystemClock},
    registry::{NodeRegistry, NodeRegistryEntry},
    router::MessageRouter,
    signature::{
        key_id_of, ActionMatch, Direction, SignaturePolicies, SignaturePolicy, SignaturePolicyRule, SigningIdentity,
        VerificationMode, ENCODING_METHOD, SIGNING_METHOD,
    },
    store::{ChargeBox, ChargeBoxChange, ChargeBoxStore, CrudResult},
};
