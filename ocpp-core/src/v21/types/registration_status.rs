#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum RegistrationStatus {
    Accepted,
    Pending,
    Rejected,
}
