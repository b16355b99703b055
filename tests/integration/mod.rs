//! Integration tests exercising the collaboration core end to end at
//! the library level (registry, room, persistence) without a live
//! network transport.

pub mod access_control_test;
pub mod collaboration_test;
pub mod offline_recovery_test;
pub mod persistence_test;
