mod identity;
mod policies;
mod policy;

pub use identity::{key_id_of, SigningIdentity, ENCODING_METHOD, SIGNING_METHOD};
pub use policies::SignaturePolicies;
pub use policy::{ActionMatch, Direction, SignaturePolicy, SignaturePolicyRule, VerificationMode};
