//! Property-based tests for the CRDT engine's convergence guarantees.

pub mod crdt_proptest;
