//! The external token-verification collaborator (§6.2).
//!
//! The core must not trust a token's signature itself; `TokenVerifier` is
//! the seam a deployment plugs its real verification into. `JwtVerifier`
//! is the default implementation.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub open_id: String,
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is malformed or has an invalid signature")]
    Invalid,
    #[error("token is expired")]
    Expired,
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}
