use std::time::Duration;

use ocpp21_core::format::envelope::NodeId;

use super::error::ConfigError;

/// Which registered signature policy is consulted for signing and verification.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum PolicySelection {
    #[default]
    MostRecentlyAdded,
    FirstAdded,
    ById(String),
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub node_id: NodeId,
    pub request_timeout_ms: u64,
    pub lock_timeout_ms: u64,
    pub heartbeat_interval_secs: i32,
    pub policy_selection: PolicySelection,
    /// Turn a response that fails signature verification into a `SignatureError`.
    /// When off, the failure is only logged and the response is returned as received.
    pub strict_response_verification: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId::new("CSMS"),
            request_timeout_ms: 30_000,
            lock_timeout_ms: 5_000,
            heartbeat_interval_secs: 300,
            policy_selection: PolicySelection::MostRecentlyAdded,
            strict_response_verification: true,
        }
    }
}

impl GatewayConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_json::from_str(raw)?;
        if config.node_id.as_str().is_empty() {
            return Err(ConfigError::Invalid("nodeId must not be empty".into()));
        }
        if config.request_timeout_ms == 0 || config.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        Ok(config)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
