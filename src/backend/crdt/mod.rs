//! CRDT Engine (§4.1).
//!
//! A thin wrapper around `diamond_types::list::ListCRDT`, the sequence
//! CRDT over a single text field ("shared-text") that backs every Room.
//! The engine itself knows nothing about Rooms, Sessions or the network —
//! it is only ever touched from behind a Room's single-writer lock (§5).

use diamond_types::list::encoding::EncodeOptions;
use diamond_types::list::{ListCRDT, OpLog};
use diamond_types::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrdtError {
    #[error("update bytes were empty")]
    Empty,
    #[error("update bytes could not be decoded: {0}")]
    Corrupt(String),
}

/// Wraps one document's CRDT state: an oplog (the append-only operation
/// history) plus a branch (the materialized view at the current frontier).
pub struct CrdtEngine {
    crdt: ListCRDT,
    agent_id: AgentId,
}

impl CrdtEngine {
    /// Build a fresh, empty document for the given agent (the server's own
    /// site id for this Room — remote clients are identified by the agent
    /// id embedded in the updates they send, not by this one).
    pub fn new(agent_name: &str) -> Self {
        let mut crdt = ListCRDT::new();
        let agent_id = crdt.get_or_create_agent_id(agent_name);
        Self { crdt, agent_id }
    }

    /// Rehydrate a document from a previously-encoded full state (as
    /// produced by `encode_full_state`), used when a Room is created from
    /// a persisted snapshot.
    pub fn from_encoded(agent_name: &str, bytes: &[u8]) -> Result<Self, CrdtError> {
        let mut engine = Self::new(agent_name);
        if !bytes.is_empty() {
            engine.apply_update(bytes)?;
        }
        Ok(engine)
    }

    /// Merge an encoded delta produced by another replica (or by this one,
    /// if it is being replayed). Idempotent and commutative (I6).
    pub fn apply_update(&mut self, bytes: &[u8]) -> Result<(), CrdtError> {
        if bytes.is_empty() {
            return Err(CrdtError::Empty);
        }
        self.crdt
            .oplog
            .decode_and_add(bytes)
            .map_err(|e| CrdtError::Corrupt(e.to_string()))?;
        self.crdt
            .branch
            .merge(&self.crdt.oplog, self.crdt.oplog.local_version_ref());
        Ok(())
    }

    /// Apply a local insert authored by this Room's own agent (used for
    /// administrative seeding/tests; ordinary client edits arrive as
    /// already-encoded updates through `apply_update`).
    pub fn insert_local(&mut self, pos: usize, text: &str) {
        self.crdt.insert(self.agent_id, pos, text);
    }

    /// Full state as a delta against the empty document.
    pub fn encode_full_state(&self) -> Vec<u8> {
        self.crdt.oplog.encode(EncodeOptions::default())
    }

    /// Delta sufficient to advance a peer at `state_vector` to the current
    /// state. An unrecognized or stale state vector still yields a valid
    /// (possibly larger) delta, since diamond-types computes the diff
    /// against whatever frontier it decodes.
    pub fn encode_diff_since(&self, state_vector: &[u8]) -> Result<Vec<u8>, CrdtError> {
        let frontier: Vec<diamond_types::Time> =
            bincode_decode_frontier(state_vector).map_err(CrdtError::Corrupt)?;
        Ok(self
            .crdt
            .oplog
            .encode_from(EncodeOptions::default(), &frontier))
    }

    /// Compact summary of applied operations, to be echoed back on a later
    /// `sync_step1` so only the missing delta is sent.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        bincode_encode_frontier(self.crdt.oplog.local_version_ref())
    }

    /// Materialized `shared-text` content.
    pub fn content(&self) -> String {
        self.crdt.branch.content().to_string()
    }

    fn oplog(&self) -> &OpLog {
        &self.crdt.oplog
    }
}

fn bincode_encode_frontier(frontier: &[diamond_types::Time]) -> Vec<u8> {
    serde_json::to_vec(frontier).unwrap_or_default()
}

fn bincode_decode_frontier(bytes: &[u8]) -> Result<Vec<diamond_types::Time>, String> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_reflected_in_content() {
        let mut engine = CrdtEngine::new("room-1");
        engine.insert_local(0, "hello");
        assert_eq!(engine.content(), "hello");
    }

    #[test]
    fn two_replicas_converge_regardless_of_order() {
        let mut a = CrdtEngine::new("a");
        a.insert_local(0, "Hello");
        let mut b = CrdtEngine::new("b");
        b.insert_local(0, "World");

        let a_update = a.encode_full_state();
        let b_update = b.encode_full_state();

        // a applies b's update, b applies a's update
        a.apply_update(&b_update).unwrap();
        b.apply_update(&a_update).unwrap();

        assert_eq!(a.content(), b.content());
    }

    #[test]
    fn applying_same_update_twice_is_idempotent() {
        let mut a = CrdtEngine::new("a");
        a.insert_local(0, "abc");
        let update = a.encode_full_state();

        let mut b = CrdtEngine::new("b");
        b.apply_update(&update).unwrap();
        let content_once = b.content();

        b.apply_update(&update).unwrap();
        assert_eq!(b.content(), content_once);
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut engine = CrdtEngine::new("a");
        let err = engine.apply_update(&[]).unwrap_err();
        assert!(matches!(err, CrdtError::Empty));
    }

    #[test]
    fn corrupt_update_is_rejected_without_mutating_state() {
        let mut engine = CrdtEngine::new("a");
        engine.insert_local(0, "keep me");
        let before = engine.content();
        let err = engine.apply_update(&[0xff, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, CrdtError::Corrupt(_)));
        assert_eq!(engine.content(), before);
    }

    #[test]
    fn snapshot_round_trips_through_from_encoded() {
        let mut engine = CrdtEngine::new("a");
        engine.insert_local(0, "persisted");
        let snapshot = engine.encode_full_state();

        let restored = CrdtEngine::from_encoded("b", &snapshot).unwrap();
        assert_eq!(restored.content(), "persisted");
    }
}
