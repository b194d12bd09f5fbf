use std::sync::{Arc, RwLock};

use crate::v21::{config::PolicySelection, error::SignatureFault};

use super::policy::SignaturePolicy;

/// Append-only set of signature policies with an explicit selection rule.
pub struct SignaturePolicies {
    policies: RwLock<Vec<Arc<SignaturePolicy>>>,
    selection: PolicySelection,
}

impl SignaturePolicies {
    pub fn new(selection: PolicySelection) -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
            selection,
        }
    }

    pub fn add(&self, policy: SignaturePolicy) -> Arc<SignaturePolicy> {
        let policy = Arc::new(policy);
        log::debug!("adding signature policy '{}'", policy.id());
        self.policies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(policy.clone());
        policy
    }

    /// `Ok(None)` when no policy is registered: messages pass unsigned and unverified.
    pub fn active(&self) -> Result<Option<Arc<SignaturePolicy>>, SignatureFault> {
        let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
        let selected = match &self.selection {
            PolicySelection::MostRecentlyAdded => policies.last().cloned(),
            PolicySelection::FirstAdded => policies.first().cloned(),
            PolicySelection::ById(id) => {
                if policies.is_empty() {
                    return Ok(None);
                }
                Some(
                    policies
                        .iter()
                        .find(|p| p.id() == id)
                        .cloned()
                        .ok_or_else(|| SignatureFault::NoActivePolicy(id.clone()))?,
                )
            }
        };
        Ok(selected)
    }

    pub fn selection(&self) -> &PolicySelection {
        &self.selection
    }

    pub fn len(&self) -> usize {
        self.policies.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        self.policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|p| p.id().to_string())
            .collect()
    }
}
