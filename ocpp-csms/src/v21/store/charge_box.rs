use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use ocpp21_core::{format::envelope::NodeId, v21::types::ChargingStation};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::v21::interface::{ChargeBoxPersistence, Clock, NoPersistence};

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargeBox {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_change: DateTime<Utc>,
}

impl ChargeBox {
    /// `last_change` is stamped by the store when the record is committed.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            vendor_name: None,
            model: None,
            serial_number: None,
            firmware_version: None,
            description: None,
            last_change: DateTime::<Utc>::default(),
        }
    }

    pub fn from_station(id: impl Into<NodeId>, station: &ChargingStation) -> Self {
        Self {
            vendor_name: Some(station.vendor_name.clone()),
            model: Some(station.model.clone()),
            serial_number: station.serial_number.clone(),
            firmware_version: station.firmware_version.clone(),
            ..Self::new(id)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChargeBoxChange {
    Added(ChargeBox),
    Updated { old: ChargeBox, new: ChargeBox },
    Deleted(ChargeBox),
}

#[derive(Debug)]
pub enum CrudResult<T> {
    Success(T),
    AlreadyExists(NodeId),
    NotFound(NodeId),
    /// The mutation lock could not be taken within the configured window.
    LockTimeout(Duration),
    Error(anyhow::Error),
}

impl<T> CrudResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CrudResult::Success(_))
    }
    pub fn kind_name(&self) -> &'static str {
        match self {
            CrudResult::Success(_) => "Success",
            CrudResult::AlreadyExists(_) => "AlreadyExists",
            CrudResult::NotFound(_) => "NotFound",
            CrudResult::LockTimeout(_) => "LockTimeout",
            CrudResult::Error(_) => "Error",
        }
    }
    pub fn success(self) -> Option<T> {
        match self {
            CrudResult::Success(t) => Some(t),
            _ => None,
        }
    }
}

/// In-memory charge box catalog. Reads are lock-free with respect to the
/// mutation lock; add, update and delete are serialized by a single permit
/// that is given up on after `lock_timeout`.
pub struct ChargeBoxStore {
    boxes: RwLock<HashMap<NodeId, ChargeBox>>,
    lock: Semaphore,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
    persistence: Arc<dyn ChargeBoxPersistence>,
}

impl ChargeBoxStore {
    pub fn new(lock_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_persistence(lock_timeout, clock, Arc::new(NoPersistence))
    }

    pub fn with_persistence(
        lock_timeout: Duration,
        clock: Arc<dyn Clock>,
        persistence: Arc<dyn ChargeBoxPersistence>,
    ) -> Self {
        Self {
            boxes: RwLock::new(HashMap::new()),
            lock: Semaphore::new(1),
            lock_timeout,
            clock,
            persistence,
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<ChargeBox> {
        self.boxes.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    pub fn all(&self) -> Vec<ChargeBox> {
        let mut boxes: Vec<ChargeBox> = self
            .boxes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        boxes.sort_by(|a, b| a.id.cmp(&b.id));
        boxes
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.boxes.read().unwrap_or_else(|e| e.into_inner()).contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.boxes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub async fn add(&self, mut charge_box: ChargeBox) -> CrudResult<ChargeBox> {
        let _permit = match self.acquire("add").await {
            Ok(permit) => permit,
            Err(res) => return res,
        };
        if self.contains(&charge_box.id) {
            return CrudResult::AlreadyExists(charge_box.id);
        }
        charge_box.last_change = self.clock.now();
        self.commit(ChargeBoxChange::Added(charge_box.clone()), charge_box).await
    }

    pub async fn add_or_update(&self, mut charge_box: ChargeBox) -> CrudResult<ChargeBox> {
        let _permit = match self.acquire("add_or_update").await {
            Ok(permit) => permit,
            Err(res) => return res,
        };
        charge_box.last_change = self.clock.now();
        let change = match self.get(&charge_box.id) {
            Some(old) => ChargeBoxChange::Updated {
                old,
                new: charge_box.clone(),
            },
            None => ChargeBoxChange::Added(charge_box.clone()),
        };
        self.commit(change, charge_box).await
    }

    /// Applies `f` to a copy of the stored record; the catalog only changes
    /// when `f` and the persistence hook both succeed.
    pub async fn update<F>(&self, id: &NodeId, f: F) -> CrudResult<ChargeBox>
    where
        F: FnOnce(&mut ChargeBox) -> anyhow::Result<()>,
    {
        let _permit = match self.acquire("update").await {
            Ok(permit) => permit,
            Err(res) => return res,
        };
        let Some(old) = self.get(id) else {
            return CrudResult::NotFound(id.clone());
        };
        let mut new = old.clone();
        match std::panic::catch_unwind(AssertUnwindSafe(|| f(&mut new))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return CrudResult::Error(e.context(format!("updating charge box {}", id))),
            Err(_) => return CrudResult::Error(anyhow::anyhow!("update of charge box {} panicked", id)),
        }
        // the id is the catalog key and cannot be changed by an update
        new.id = old.id.clone();
        new.last_change = self.clock.now();
        self.commit(ChargeBoxChange::Updated { old, new: new.clone() }, new).await
    }

    pub async fn delete(&self, id: &NodeId) -> CrudResult<ChargeBox> {
        let _permit = match self.acquire("delete").await {
            Ok(permit) => permit,
            Err(res) => return res,
        };
        let Some(old) = self.get(id) else {
            return CrudResult::NotFound(id.clone());
        };
        self.commit(ChargeBoxChange::Deleted(old.clone()), old).await
    }

    async fn acquire<T>(&self, operation: &str) -> Result<SemaphorePermit<'_>, CrudResult<T>> {
        match tokio::time::timeout(self.lock_timeout, self.lock.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(e)) => Err(CrudResult::Error(anyhow::Error::new(e).context("charge box lock closed"))),
            Err(_) => {
                log::warn!("charge box {}: lock not acquired within {:?}", operation, self.lock_timeout);
                Err(CrudResult::LockTimeout(self.lock_timeout))
            }
        }
    }

    async fn commit<T>(&self, change: ChargeBoxChange, value: T) -> CrudResult<T> {
        if let Err(e) = self.persistence.persist(&change).await {
            log::error!("charge box change not persisted: {:#}", e);
            return CrudResult::Error(e);
        }
        let mut boxes = self.boxes.write().unwrap_or_else(|e| e.into_inner());
        match change {
            ChargeBoxChange::Added(charge_box) | ChargeBoxChange::Updated { new: charge_box, .. } => {
                log::debug!("charge box {} stored", charge_box.id);
                boxes.insert(charge_box.id.clone(), charge_box);
            }
            ChargeBoxChange::Deleted(charge_box) => {
                log::debug!("charge box {} deleted", charge_box.id);
                boxes.remove(&charge_box.id);
            }
        }
        CrudResult::Success(value)
    }
}
