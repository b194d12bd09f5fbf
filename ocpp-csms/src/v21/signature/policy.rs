use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use ocpp21_core::{
    format::{
        canonical::canonicalize,
        envelope::{OcppResult, Request, Response},
    },
    v21::{messages::OcppCall, types::Signature},
};

use super::identity::{key_id_of, verify_signature, SigningIdentity};
use crate::v21::error::SignatureFault;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionMatch {
    Any,
    Action(String),
}

impl ActionMatch {
    fn matches(&self, action: &str) -> bool {
        match self {
            ActionMatch::Any => true,
            ActionMatch::Action(a) => a == action,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerificationMode {
    Skip,
    #[default]
    VerifyIfPresent,
    Require,
}

#[derive(Clone, Debug)]
pub struct SignaturePolicyRule {
    pub action: ActionMatch,
    pub direction: Option<Direction>,
    pub verification: VerificationMode,
    pub signer: Option<Arc<SigningIdentity>>,
}

impl SignaturePolicyRule {
    pub fn any() -> Self {
        Self {
            action: ActionMatch::Any,
            direction: None,
            verification: VerificationMode::default(),
            signer: None,
        }
    }
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: ActionMatch::Action(action.into()),
            ..Self::any()
        }
    }
    pub fn requests_only(mut self) -> Self {
        self.direction = Some(Direction::Request);
        self
    }
    pub fn responses_only(mut self) -> Self {
        self.direction = Some(Direction::Response);
        self
    }
    pub fn verification(mut self, mode: VerificationMode) -> Self {
        self.verification = mode;
        self
    }
    pub fn require(self) -> Self {
        self.verification(VerificationMode::Require)
    }
    pub fn sign_with(mut self, signer: Arc<SigningIdentity>) -> Self {
        self.signer = Some(signer);
        self
    }
    fn applies(&self, action: &str, direction: Direction) -> bool {
        self.action.matches(action) && self.direction.map(|d| d == direction).unwrap_or(true)
    }
}

/// Ordered rule set deciding how messages are verified and signed.
///
/// The first rule matching the action and direction wins, otherwise the
/// default rule applies (verify whatever is present, sign nothing).
/// When `trusted_keys` is empty any well-formed, valid signature is accepted.
#[derive(Clone, Debug)]
pub struct SignaturePolicy {
    id: String,
    rules: Vec<SignaturePolicyRule>,
    default_rule: SignaturePolicyRule,
    trusted_keys: Vec<VerifyingKey>,
}

impl SignaturePolicy {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rules: Vec::new(),
            default_rule: SignaturePolicyRule::any(),
            trusted_keys: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: SignaturePolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_default_rule(mut self, rule: SignaturePolicyRule) -> Self {
        self.default_rule = rule;
        self
    }

    pub fn trust(mut self, key: VerifyingKey) -> Self {
        if !self.trusted_keys.contains(&key) {
            self.trusted_keys.push(key);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rule_for(&self, action: &str, direction: Direction) -> &SignaturePolicyRule {
        self.rules
            .iter()
            .find(|r| r.applies(action, direction))
            .unwrap_or(&self.default_rule)
    }

    pub fn verify_request_message(
        &self,
        action: &str,
        bytes: &[u8],
        signatures: &[Signature],
    ) -> Result<(), SignatureFault> {
        self.verify(action, Direction::Request, bytes, signatures)
    }

    pub fn verify_response_message(
        &self,
        action: &str,
        bytes: &[u8],
        signatures: &[Signature],
    ) -> Result<(), SignatureFault> {
        self.verify(action, Direction::Response, bytes, signatures)
    }

    pub fn sign_request_message(
        &self,
        action: &str,
        bytes: &[u8],
        signatures: &mut Vec<Signature>,
        signed_at: DateTime<Utc>,
    ) -> Result<(), SignatureFault> {
        self.sign(action, Direction::Request, bytes, signatures, signed_at)
    }

    pub fn sign_response_message(
        &self,
        action: &str,
        bytes: &[u8],
        signatures: &mut Vec<Signature>,
        signed_at: DateTime<Utc>,
    ) -> Result<(), SignatureFault> {
        self.sign(action, Direction::Response, bytes, signatures, signed_at)
    }

    pub fn verify_request<T: OcppCall>(&self, request: &Request<T>) -> Result<(), SignatureFault> {
        let bytes = canonicalize(&request.payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()))?;
        self.verify_request_message(T::ACTION, &bytes, &request.signatures)
    }

    pub fn sign_request<T: OcppCall>(
        &self,
        request: &mut Request<T>,
        signed_at: DateTime<Utc>,
    ) -> Result<(), SignatureFault> {
        let bytes = canonicalize(&request.payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()))?;
        self.sign_request_message(T::ACTION, &bytes, &mut request.signatures, signed_at)
    }

    /// Only a successful response has a payload to verify; other results pass.
    pub fn verify_response<T: OcppCall>(&self, response: &Response<T::Response>) -> Result<(), SignatureFault> {
        match &response.result {
            OcppResult::Success(payload) => {
                let bytes = canonicalize(payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()))?;
                self.verify_response_message(T::ACTION, &bytes, &response.signatures)
            }
            _ => Ok(()),
        }
    }

    pub fn sign_response<T: OcppCall>(
        &self,
        response: &mut Response<T::Response>,
        signed_at: DateTime<Utc>,
    ) -> Result<(), SignatureFault> {
        match &response.result {
            OcppResult::Success(payload) => {
                let bytes = canonicalize(payload).map_err(|e| SignatureFault::Canonicalization(e.to_string()))?;
                self.sign_response_message(T::ACTION, &bytes, &mut response.signatures, signed_at)
            }
            _ => Ok(()),
        }
    }

    fn verify(
        &self,
        action: &str,
        direction: Direction,
        bytes: &[u8],
        signatures: &[Signature],
    ) -> Result<(), SignatureFault> {
        let rule = self.rule_for(action, direction);
        if rule.verification == VerificationMode::Skip {
            return Ok(());
        }
        if signatures.is_empty() {
            return match rule.verification {
                VerificationMode::Require => Err(SignatureFault::Missing {
                    action: action.to_string(),
                }),
                _ => Ok(()),
            };
        }
        for signature in signatures {
            let key = verify_signature(signature, bytes)?;
            if !self.trusted_keys.is_empty() && !self.trusted_keys.contains(&key) {
                return Err(SignatureFault::UntrustedKey(key_id_of(&key)));
            }
        }
        Ok(())
    }

    fn sign(
        &self,
        action: &str,
        direction: Direction,
        bytes: &[u8],
        signatures: &mut Vec<Signature>,
        signed_at: DateTime<Utc>,
    ) -> Result<(), SignatureFault> {
        let Some(signer) = &self.rule_for(action, direction).signer else {
            return Ok(());
        };
        let signature = signer.sign(bytes, signed_at);
        // re-signing replaces this key's entry instead of adding another one
        match signatures.iter_mut().find(|s| s.key_id == signature.key_id) {
            Some(existing) => *existing = signature,
            None => signatures.push(signature),
        }
        Ok(())
    }
}
