//! Backend: the collaboration core server.
//!
//! A document's live state lives in a [`room`], constructed on demand by
//! the [`registry`] and owning a [`crdt`] engine. Each connected client is
//! driven by a [`connection`] task implementing the sync protocol's state
//! machine, authenticated through [`auth`], and durable state is handled
//! by [`persistence`]. [`offline`] replays a reconnecting client's queued
//! updates; [`server`] wires all of it into an Axum [`Router`](axum::Router).

pub mod auth;
pub mod connection;
pub mod crdt;
pub mod error;
pub mod offline;
pub mod persistence;
pub mod registry;
pub mod room;
pub mod routes;
pub mod server;

pub use error::BackendError;
pub use server::create_app;
