//! Room (§4.3): one instance per active document, owning the CRDT
//! document, the member set, Lamport/vector clocks, the unpersisted-
//! operation buffer, and the last-snapshot marker.
//!
//! Concurrency discipline (§5): Room holds one exclusive lock across
//! apply, broadcast, and persist — `RoomInner` sits behind one
//! `tokio::sync::Mutex`, so CRDT apply,
//! lamport/vector-clock bump, buffered-op append, broadcast, and the
//! persistence write are all observed by every member in the order the
//! Room committed them (P4).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

use crate::backend::crdt::CrdtEngine;
use crate::backend::error::BackendError;
use crate::backend::persistence::{OperationRecord, Storage};
use crate::shared::config::AppConfig;
use crate::shared::ids::{ClientId, DocumentId, UserId};
use crate::shared::message::{CursorPayload, MemberInfo, ServerMessage};

/// One connected member of a Room. Lifetime = one connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: ClientId,
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub color: String,
    pub name: Option<String>,
    pub position: u32,
    pub selection: Option<(u32, u32)>,
    pub last_heartbeat: Instant,
}

impl Session {
    pub fn member_info(&self) -> MemberInfo {
        MemberInfo {
            client_id: self.client_id.clone(),
            user_id: self.user_id,
            name: self.name.clone(),
            color: Some(self.color.clone()),
        }
    }
}

/// Accumulated update bytes since the last checkpoint.
#[derive(Debug, Clone)]
pub struct BufferedOp {
    pub bytes: Vec<u8>,
    pub client_id: ClientId,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotMarker {
    pub version: i64,
    pub timestamp_ms: i64,
}

/// The package a newly-admitted client needs to initialize (§4.3 `admit`).
pub struct AdmitResult {
    pub full_state: Vec<u8>,
    pub members: Vec<MemberInfo>,
    pub lamport: u64,
    /// Set when this admit evicted a stale session with the same `ClientId`.
    pub evicted: Option<ClientId>,
}

struct RoomInner {
    document_id: DocumentId,
    engine: CrdtEngine,
    members: HashMap<ClientId, Session>,
    lamport: u64,
    vector_clock: HashMap<ClientId, u64>,
    pending_ops: Vec<BufferedOp>,
    snapshot: SnapshotMarker,
    snapshot_op_threshold: usize,
}

/// A live Room, cheaply cloneable — every clone shares the same state and
/// broadcast channel.
#[derive(Clone)]
pub struct RoomHandle {
    document_id: DocumentId,
    inner: Arc<Mutex<RoomInner>>,
    broadcast_tx: broadcast::Sender<ServerMessage>,
}

impl RoomHandle {
    /// Build a fresh Room, optionally seeded from a persisted snapshot
    /// (§4.6 read path: snapshot, then any trailing operations applied in
    /// ascending version order).
    pub fn new(
        document_id: DocumentId,
        config: &AppConfig,
        snapshot_state: Option<&[u8]>,
        snapshot_version: i64,
        trailing_operations: Vec<OperationRecord>,
    ) -> Result<Self, BackendError> {
        let agent_name = format!("room-{document_id}");
        let mut engine = match snapshot_state {
            Some(bytes) if !bytes.is_empty() => CrdtEngine::from_encoded(&agent_name, bytes)
                .map_err(|e| BackendError::server_error(e.to_string()))?,
            _ => CrdtEngine::new(&agent_name),
        };

        let mut vector_clock = HashMap::new();
        for op in &trailing_operations {
            engine
                .apply_update(&op.bytes)
                .map_err(|e| BackendError::server_error(e.to_string()))?;
            *vector_clock.entry(op.client_id.clone()).or_insert(0) += 1;
        }
        let lamport = trailing_operations.iter().map(|op| op.lamport).max().unwrap_or(0);

        let (broadcast_tx, _) = broadcast::channel(1024);

        Ok(Self {
            document_id,
            broadcast_tx,
            inner: Arc::new(Mutex::new(RoomInner {
                document_id,
                engine,
                members: HashMap::new(),
                lamport,
                vector_clock,
                pending_ops: Vec::new(),
                snapshot: SnapshotMarker {
                    version: snapshot_version,
                    timestamp_ms: 0,
                },
                snapshot_op_threshold: config.snapshot_op_threshold,
            })),
        })
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast_tx.subscribe()
    }

    fn broadcast(&self, message: ServerMessage) {
        // No receivers is not an error: it just means nobody else is
        // currently subscribed to this Room.
        let _ = self.broadcast_tx.send(message);
    }

    /// Insert into `members`. A duplicate `ClientId` evicts the stale
    /// entry first so peers observe `user_left` then `user_joined` in
    /// order (§4.3 edge case).
    pub async fn admit(&self, session: Session) -> AdmitResult {
        let mut inner = self.inner.lock().await;
        let evicted = inner.members.insert(session.client_id.clone(), session.clone());
        if let Some(old) = &evicted {
            self.broadcast(ServerMessage::UserLeft {
                client_id: old.client_id.clone(),
                user_id: old.user_id,
            });
        }
        let members = inner.members.values().map(Session::member_info).collect();
        let result = AdmitResult {
            full_state: inner.engine.encode_full_state(),
            members,
            lamport: inner.lamport,
            evicted: evicted.map(|s| s.client_id),
        };
        self.broadcast(ServerMessage::UserJoined(session.member_info()));
        result
    }

    /// Remove from members. Returns `true` if the Room is now empty (the
    /// caller is then responsible for checkpointing and dropping it).
    pub async fn leave(&self, client_id: &ClientId) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.members.remove(client_id) {
            self.broadcast(ServerMessage::UserLeft {
                client_id: session.client_id,
                user_id: session.user_id,
            });
        }
        inner.members.is_empty()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.members.is_empty()
    }

    /// (1) merge into CRDT, (2) lamport += 1, (3) vectorClock[origin] += 1,
    /// (4) append to pendingOps, (5) persist, (6) return post-apply
    /// lamport, (7) checkpoint if the buffer grew past the threshold.
    pub async fn apply_remote(
        &self,
        update: &[u8],
        origin: &ClientId,
        storage: &dyn Storage,
    ) -> Result<u64, BackendError> {
        let mut inner = self.inner.lock().await;

        inner
            .engine
            .apply_update(update)
            .map_err(|e| BackendError::update_failed(e.to_string()))?;

        inner.lamport += 1;
        *inner.vector_clock.entry(origin.clone()).or_insert(0) += 1;

        let timestamp = Utc::now();
        inner.pending_ops.push(BufferedOp {
            bytes: update.to_vec(),
            client_id: origin.clone(),
            timestamp,
        });

        let version = inner.snapshot.version + inner.pending_ops.len() as i64;
        let lamport = inner.lamport;
        let vector_clock = inner
            .vector_clock
            .iter()
            .map(|(k, v)| (k.0.clone(), *v))
            .collect();
        let user_id = inner
            .members
            .get(origin)
            .map(|session| session.user_id)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "apply_remote: no member session for client {origin:?} in document {}, \
                     falling back to UserId::default()",
                    inner.document_id
                );
                UserId::default()
            });

        // Best-effort write: failure is logged and retried at the next
        // successful checkpoint (§4.6), the in-memory CRDT stays the
        // source of truth regardless.
        if let Err(e) = storage
            .add_operation(OperationRecord {
                document_id: inner.document_id,
                client_id: origin.clone(),
                user_id,
                bytes: update.to_vec(),
                lamport,
                vector_clock,
                version,
            })
            .await
        {
            tracing::warn!("failed to persist operation for document {}: {e}", inner.document_id);
        }

        self.broadcast(ServerMessage::Update {
            client_id: origin.clone(),
            update: update.to_vec(),
            lamport_time: lamport,
            timestamp: timestamp.timestamp_millis(),
        });

        let should_checkpoint = inner.pending_ops.len() > inner.snapshot_op_threshold;
        drop(inner);
        if should_checkpoint {
            self.checkpoint(storage).await?;
        }

        Ok(lamport)
    }

    /// Delta advancing a peer at `state_vector` to the Room's current
    /// state. An unknown state vector still yields a valid delta.
    pub async fn compute_diff(&self, state_vector: &[u8]) -> Result<Vec<u8>, BackendError> {
        let inner = self.inner.lock().await;
        inner
            .engine
            .encode_diff_since(state_vector)
            .map_err(|e| BackendError::update_failed(e.to_string()))
    }

    /// Update the Session's cursor fields and heartbeat timestamp.
    pub async fn update_cursor(
        &self,
        client_id: &ClientId,
        position: u32,
        selection: Option<(u32, u32)>,
    ) -> Option<CursorPayload> {
        let mut inner = self.inner.lock().await;
        let session = inner.members.get_mut(client_id)?;
        session.position = position;
        session.selection = selection;
        session.last_heartbeat = Instant::now();

        let payload = CursorPayload {
            client_id: session.client_id.clone(),
            user_id: Some(session.user_id),
            position,
            selection,
            color: Some(session.color.clone()),
            name: session.name.clone(),
        };
        self.broadcast(ServerMessage::CursorUpdate(payload.clone()));
        Some(payload)
    }

    pub async fn touch_heartbeat(&self, client_id: &ClientId) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.members.get_mut(client_id) {
            session.last_heartbeat = Instant::now();
        }
    }

    /// Sessions stale for longer than `timeout`.
    pub async fn stale_members(&self, timeout: std::time::Duration) -> Vec<ClientId> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        inner
            .members
            .values()
            .filter(|s| now.duration_since(s.last_heartbeat) > timeout)
            .map(|s| s.client_id.clone())
            .collect()
    }

    /// Encode full state, hand to persistence, clear pendingOps, bump
    /// `snapshot.version`.
    pub async fn checkpoint(&self, storage: &dyn Storage) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        let full_state = inner.engine.encode_full_state();
        let new_version = inner.snapshot.version + inner.pending_ops.len() as i64;
        let document_id = inner.document_id;

        if let Err(e) = storage.update_document_snapshot(document_id, &full_state, new_version).await {
            tracing::warn!("checkpoint write failed for document {document_id}: {e}");
            return Ok(());
        }

        inner.pending_ops.clear();
        inner.snapshot = SnapshotMarker {
            version: new_version,
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        Ok(())
    }

    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn content(&self) -> String {
        self.inner.lock().await.engine.content()
    }
}
