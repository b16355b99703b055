//! Error cases that belong to the wire protocol itself rather than to any
//! one backend module: a malformed sync-protocol payload, a cursor
//! position outside the document, or a message that doesn't decode.
//! `BackendError::Shared` folds these into the rest of the error
//! taxonomy (§7).
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SharedError {
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("validation error in field '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("message error: {message}")]
    MessageError { message: String },
}

impl SharedError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::MessageError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("json error: {}", err))
    }
}
