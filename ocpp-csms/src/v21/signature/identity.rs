use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use ocpp21_core::v21::types::Signature;

use crate::v21::error::SignatureFault;

pub const SIGNING_METHOD: &str = "ed25519";
pub const ENCODING_METHOD: &str = "base64";

pub fn key_id_of(key: &VerifyingKey) -> String {
    BASE64.encode(key.to_bytes())
}

/// Ed25519 key pair a policy signs outgoing messages with.
pub struct SigningIdentity {
    signing_key: SigningKey,
    key_id: String,
    name: Option<String>,
}

impl SigningIdentity {
    pub fn generate() -> Self {
        Self::from_secret_bytes(&rand::random::<[u8; 32]>())
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let key_id = key_id_of(&signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, bytes: &[u8], timestamp: DateTime<Utc>) -> Signature {
        let value = self.signing_key.sign(bytes);
        Signature {
            key_id: self.key_id.clone(),
            value: BASE64.encode(value.to_bytes()),
            signing_method: SIGNING_METHOD.to_string(),
            encoding_method: ENCODING_METHOD.to_string(),
            name: self.name.clone(),
            description: None,
            timestamp: Some(timestamp),
        }
    }
}

impl core::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("key_id", &self.key_id)
            .field("name", &self.name)
            .finish()
    }
}

/// Checks one wire signature over `bytes` and returns the key that produced it.
pub(crate) fn verify_signature(signature: &Signature, bytes: &[u8]) -> Result<VerifyingKey, SignatureFault> {
    if !signature.signing_method.eq_ignore_ascii_case(SIGNING_METHOD)
        || !signature.encoding_method.eq_ignore_ascii_case(ENCODING_METHOD)
    {
        return Err(SignatureFault::UnsupportedMethod {
            signing_method: signature.signing_method.clone(),
            encoding_method: signature.encoding_method.clone(),
        });
    }

    let key_bytes: [u8; 32] = BASE64
        .decode(signature.key_id.trim())
        .map_err(|e| SignatureFault::Malformed(format!("key id is not base64: {}", e)))?
        .try_into()
        .map_err(|_| SignatureFault::Malformed("key id must encode 32 bytes".into()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| SignatureFault::Malformed(format!("invalid ed25519 key: {}", e)))?;

    let value_bytes: [u8; 64] = BASE64
        .decode(signature.value.trim())
        .map_err(|e| SignatureFault::Malformed(format!("signature value is not base64: {}", e)))?
        .try_into()
        .map_err(|_| SignatureFault::Malformed("signature value must encode 64 bytes".into()))?;
    let value = ed25519_dalek::Signature::from_bytes(&value_bytes);

    key.verify(bytes, &value)
        .map_err(|_| SignatureFault::Invalid(signature.key_id.clone()))?;
    Ok(key)
}
