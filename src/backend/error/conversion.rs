//! Error conversion to a wire `ServerMessage::Error`. Every `BackendError`
//! that reaches a client does so over the WebSocket connection, never as
//! an HTTP response — there is no route that returns a `BackendError`.

use crate::backend::error::types::BackendError;
use crate::shared::message::ServerMessage;

impl BackendError {
    /// Build the `error` sync-protocol message this error should be
    /// reported to the client as.
    pub fn into_wire_message(self) -> ServerMessage {
        ServerMessage::Error {
            message: self.message(),
            code: self.code(),
        }
    }
}
