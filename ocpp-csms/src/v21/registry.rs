use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ocpp21_core::format::envelope::NodeId;

use super::interface::Channel;

/// What the registry knows about one node. The channel is borrowed from the
/// transport, so a dropped connection shows up as a dead weak reference.
#[derive(Clone)]
pub struct NodeRegistryEntry {
    pub node_id: NodeId,
    pub channel: Weak<dyn Channel>,
    pub last_seen: DateTime<Utc>,
}

impl NodeRegistryEntry {
    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.upgrade().filter(|c| c.is_open())
    }
}

/// Node id to live channel table, safe to use from many connection tasks at once.
#[derive(Default)]
pub struct NodeRegistry {
    entries: DashMap<NodeId, NodeRegistryEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Last writer wins: a reconnect silently replaces the previous entry.
    pub fn upsert(&self, node_id: NodeId, channel: &Arc<dyn Channel>, timestamp: DateTime<Utc>) {
        let entry = NodeRegistryEntry {
            node_id: node_id.clone(),
            channel: Arc::downgrade(channel),
            last_seen: timestamp,
        };
        if self.entries.insert(node_id.clone(), entry).is_some() {
            log::debug!("replaced channel of node {}", node_id);
        } else {
            log::debug!("registered node {}", node_id);
        }
    }

    pub fn lookup(&self, node_id: &NodeId) -> Option<Arc<dyn Channel>> {
        let channel = self.entries.get(node_id).and_then(|e| e.channel());
        if channel.is_none() {
            // only prune when the entry is still dead, a concurrent upsert may have replaced it
            if self.entries.remove_if(node_id, |_, e| e.channel().is_none()).is_some() {
                log::debug!("pruned dead channel of node {}", node_id);
            }
        }
        channel
    }

    pub fn entry(&self, node_id: &NodeId) -> Option<NodeRegistryEntry> {
        self.entries.get(node_id).map(|e| e.value().clone())
    }

    pub fn touch(&self, node_id: &NodeId, timestamp: DateTime<Utc>) -> bool {
        match self.entries.get_mut(node_id) {
            Some(mut entry) => {
                entry.last_seen = timestamp;
                true
            }
            None => false,
        }
    }

    /// Close hook: removes the entry only while it still points at `channel`,
    /// so the close of an old connection never evicts its replacement.
    pub fn remove_if_same(&self, node_id: &NodeId, channel: &Arc<dyn Channel>) -> bool {
        let target = Arc::downgrade(channel);
        self.entries
            .remove_if(node_id, |_, e| Weak::ptr_eq(&e.channel, &target))
            .is_some()
    }

    pub fn remove(&self, node_id: &NodeId) -> bool {
        self.entries.remove(node_id).is_some()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.entries.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
