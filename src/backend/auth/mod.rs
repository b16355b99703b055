//! Authentication verification (§6.2, §4.8).
//!
//! The core does not issue or store credentials — that is an external
//! collaborator's job. It only ever consumes a `TokenVerifier`, which
//! takes the bearer token carried in `join_room` and returns a verified
//! `{openId, exp}` pair, or rejects it.

pub mod jwt;
pub mod verifier;

pub use jwt::JwtVerifier;
pub use verifier::{AuthError, TokenVerifier, VerifiedIdentity};
