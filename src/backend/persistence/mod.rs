//! Persistence Adapter (§4.6) and the storage interfaces it exposes to the
//! rest of the core (§6.3).
//!
//! The document-metadata API and the user directory are external
//! collaborators; they are modeled here as narrow
//! traits (`MetadataStore`, `UserDirectory`) so the core never assumes how
//! they are implemented. `Storage` covers the remaining §6.3 operations the
//! core itself owns end to end: operation log, session records, snapshot
//! writes, and the offline queue.

pub mod memory;
pub mod sqlx_store;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::shared::ids::{ClientId, DocumentId, UserId};

/// A document's metadata and, if it exists, its last checkpoint.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub snapshot_state: Option<Vec<u8>>,
    pub snapshot_version: Option<i64>,
}

/// A resolved access grant role. `Owner` always passes; any other role
/// means an explicit access grant exists for `(documentId, userId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRole {
    Owner,
    Grant,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub open_id: String,
}

/// One append-only row in the operation log (I5: strictly increasing
/// `version` per document, unique `(document, version)`).
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub document_id: DocumentId,
    pub client_id: ClientId,
    pub user_id: UserId,
    pub bytes: Vec<u8>,
    pub lamport: u64,
    pub vector_clock: HashMap<String, u64>,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct OfflineQueueEntry {
    pub client_id: ClientId,
    pub document_id: DocumentId,
    pub bytes: Vec<u8>,
    pub sequence_number: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("write timed out")]
    Timeout,
}

/// §6.3's `getDocument` / `checkDocumentAccess`.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_document(&self, document_id: DocumentId) -> Result<Option<DocumentRecord>, StorageError>;

    /// AND-predicate over `(documentId, userId)` — resolved open question
    /// (§9): the source combined these with a short-circuit OR, which is
    /// wrong; this interface requires implementations to use AND.
    async fn check_document_access(
        &self,
        document_id: DocumentId,
        user_id: UserId,
    ) -> Result<Option<AccessRole>, StorageError>;
}

/// §6.3's `getUserByOpenId`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_open_id(&self, open_id: &str) -> Result<Option<UserRecord>, StorageError>;
}

/// §6.3's remaining operations: operation log, session records, snapshot
/// writes, offline queue.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn add_operation(&self, op: OperationRecord) -> Result<(), StorageError>;

    async fn get_operations_since(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> Result<Vec<OperationRecord>, StorageError>;

    async fn create_session(
        &self,
        document_id: DocumentId,
        user_id: UserId,
        client_id: ClientId,
        color: &str,
    ) -> Result<(), StorageError>;

    async fn delete_session(&self, client_id: &ClientId) -> Result<(), StorageError>;

    async fn update_session_cursor(
        &self,
        client_id: &ClientId,
        position: u32,
        selection: Option<(u32, u32)>,
    ) -> Result<(), StorageError>;

    /// Actually persists the snapshot bytes and version — resolved open
    /// question (§9): the source's snapshot-write path logged success
    /// without calling an update, leaving the database's snapshot stale.
    async fn update_document_snapshot(
        &self,
        document_id: DocumentId,
        state_bytes: &[u8],
        version: i64,
    ) -> Result<(), StorageError>;

    async fn add_offline_operation(&self, entry: OfflineQueueEntry) -> Result<(), StorageError>;

    async fn get_offline_queue(
        &self,
        client_id: &ClientId,
        document_id: DocumentId,
    ) -> Result<Vec<OfflineQueueEntry>, StorageError>;

    async fn clear_offline_queue(&self, client_id: &ClientId, document_id: DocumentId) -> Result<(), StorageError>;
}
