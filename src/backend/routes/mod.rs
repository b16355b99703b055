//! Route configuration: the WebSocket endpoint and static asset serving.

pub mod router;

pub use router::create_router;
