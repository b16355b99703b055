//! Shared Module
//!
//! Types shared between the wire protocol and the backend: identifiers,
//! sync-protocol messages, the generic error type, and application
//! configuration. Everything here is plain data — no I/O.

/// Identifiers (`DocumentId`, `UserId`, `ClientId`) and the color palette.
pub mod ids;

/// Sync protocol message schema (§4.5).
pub mod message;

/// Generic error type shared across modules.
pub mod error;

/// Application configuration (§6.4).
pub mod config;

pub use config::{AppConfig, ConfigError};
pub use error::SharedError;
pub use ids::{ClientId, ColorAssigner, DocumentId, UserId};
pub use message::{ClientMessage, CursorPayload, ErrorCode, MemberInfo, ServerMessage};
