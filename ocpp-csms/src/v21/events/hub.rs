use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, RwLock},
};

use futures::{future::BoxFuture, FutureExt};

use super::{EventKind, GatewayEvent};

pub type Subscriber = Arc<dyn Fn(GatewayEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Per-event lists of observer callbacks.
///
/// A failing or panicking observer is logged and counted, never propagated:
/// message processing continues whatever the observers do.
#[derive(Default)]
pub struct EventHub {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(GatewayEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Runs every subscriber of the event's slot concurrently and waits for all
    /// of them. Returns how many failed.
    pub async fn notify(&self, event: GatewayEvent) -> usize {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        if subscribers.is_empty() {
            return 0;
        }

        let kind = event.kind;
        let calls = subscribers.into_iter().map(|subscriber| {
            let event = event.clone();
            // the callback itself may panic before handing out a future
            async move {
                match std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(event))) {
                    Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                    Err(panic) => Err(panic),
                }
            }
        });

        let mut failed = 0;
        for result in futures::future::join_all(calls).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    log::warn!("{:?} subscriber failed: {:#}", kind, e);
                }
                Err(_) => {
                    failed += 1;
                    log::error!("{:?} subscriber panicked", kind);
                }
            }
        }
        failed
    }
}
