#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureFault {
    #[error("'{action}' requires a signature but none was present")]
    Missing { action: String },
    #[error("malformed signature: {0}")]
    Malformed(String),
    #[error("unsupported signature method '{signing_method}'/'{encoding_method}'")]
    UnsupportedMethod {
        signing_method: String,
        encoding_method: String,
    },
    #[error("signature key '{0}' is not trusted")]
    UntrustedKey(String),
    #[error("signature of key '{0}' does not match the message")]
    Invalid(String),
    #[error("message could not be canonicalized: {0}")]
    Canonicalization(String),
    #[error("no signature policy with id '{0}' is registered")]
    NoActivePolicy(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("gateway configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid gateway configuration: {0}")]
    Invalid(String),
}
