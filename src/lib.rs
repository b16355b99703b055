//! roomsync: a real-time collaborative text editor backend.
//!
//! A [`backend::room::RoomHandle`] owns one document's CRDT state and
//! member set; the [`backend::registry::RoomRegistry`] constructs and
//! retires rooms on demand, and [`backend::connection`] drives the
//! per-connection sync protocol over WebSockets. [`shared`] holds the
//! wire types and configuration used by both the server and its tests.

pub mod backend;
pub mod shared;
