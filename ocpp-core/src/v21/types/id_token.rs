use chrono::{DateTime, Utc};

use super::AuthorizationStatus;

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdToken {
    pub id_token: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenInfo {
    pub status: AuthorizationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_expiry_date_time: Option<DateTime<Utc>>,
}

impl IdTokenInfo {
    pub fn is_valid(&self, current_time: DateTime<Utc>) -> bool {
        self.status == AuthorizationStatus::Accepted
            && self.cache_expiry_date_time.map(|t| current_time <= t).unwrap_or(true)
    }
}
