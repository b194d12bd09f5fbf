#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum OperationalStatus {
    Inoperative,
    Operative,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum ChangeAvailabilityStatus {
    Accepted,
    Rejected,
    Scheduled,
}
