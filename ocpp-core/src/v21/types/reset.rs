#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum ResetType {
    Immediate,
    OnIdle,
    ImmediateAndResume,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum ResetStatus {
    Accepted,
    Rejected,
    Scheduled,
}
