use chrono::{DateTime, Utc};
use ocpp21_core::{
    format::{envelope::RoutingHeader, frame::Call, message::CallResponse},
    v21::protocol_error::ProtocolError,
};
use tokio_util::sync::CancellationToken;

use super::{error::ChannelError, store::ChargeBoxChange};

/// A live connection to one networking node, owned by the transport layer.
#[async_trait::async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Sends a CALL and waits for the matching CALLRESULT or CALLERROR.
    async fn call(
        &self,
        header: RoutingHeader,
        call: Call,
        cancel: CancellationToken,
    ) -> Result<CallResponse<ProtocolError>, ChannelError>;

    fn is_open(&self) -> bool {
        true
    }
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Awaited with the catalog lock held, before a change is committed.
#[async_trait::async_trait]
pub trait ChargeBoxPersistence: Send + Sync + 'static {
    async fn persist(&self, change: &ChargeBoxChange) -> anyhow::Result<()>;
}

pub struct NoPersistence;

#[async_trait::async_trait]
impl ChargeBoxPersistence for NoPersistence {
    async fn persist(&self, _change: &ChargeBoxChange) -> anyhow::Result<()> {
        Ok(())
    }
}
