//! Backend error types (§7), and their conversion to wire messages.

pub mod conversion;
pub mod types;

pub use types::BackendError;
