//! Backend error taxonomy (§7).
//!
//! Each variant carries the wire `ErrorCode` it maps to, plus a
//! human-readable message. Handlers build one of these, log it at the
//! level its category dictates, and reply to the offending connection
//! with a `ServerMessage::Error`.

use thiserror::Error;

use crate::shared::error::SharedError;
use crate::shared::message::ErrorCode;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing, malformed, or expired token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Token valid, no matching user.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// User lacks permission on the document.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Message sent before `join_room` succeeded.
    #[error("not in room: {0}")]
    NotInRoom(String),

    /// Update bytes invalid or the CRDT engine rejected them.
    #[error("update failed: {0}")]
    UpdateFailed(String),

    /// Unexpected internal failure.
    #[error("server error: {0}")]
    ServerError(String),

    #[error(transparent)]
    Shared(#[from] SharedError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::AuthFailed(message.into())
    }

    pub fn user_not_found(message: impl Into<String>) -> Self {
        Self::UserNotFound(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn not_in_room(message: impl Into<String>) -> Self {
        Self::NotInRoom(message.into())
    }

    pub fn update_failed(message: impl Into<String>) -> Self {
        Self::UpdateFailed(message.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError(message.into())
    }

    /// The wire error code a sync-protocol `error` message should carry.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthFailed(_) => ErrorCode::AuthFailed,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AccessDenied(_) => ErrorCode::AccessDenied,
            Self::NotInRoom(_) => ErrorCode::NotInRoom,
            Self::UpdateFailed(_) => ErrorCode::UpdateFailed,
            Self::ServerError(_) | Self::Shared(_) | Self::Serialization(_) => ErrorCode::ServerError,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Per §7: does this error close the connection after the reply is sent?
    pub fn closes_connection(&self) -> bool {
        !matches!(self, Self::NotInRoom(_) | Self::UpdateFailed(_) | Self::ServerError(_))
    }
}
