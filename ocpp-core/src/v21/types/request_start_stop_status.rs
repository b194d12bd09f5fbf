#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum RequestStartStopStatus {
    Accepted,
    Rejected,
}
