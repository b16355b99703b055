//! In-process storage: the adapter used for tests and for running the
//! core when `DATABASE_URL` is unset — the server degrades rather than
//! refusing to start when there is no database connection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::shared::ids::{ClientId, DocumentId, UserId};

use super::{
    AccessRole, DocumentRecord, MetadataStore, OfflineQueueEntry, OperationRecord, Storage,
    StorageError, UserDirectory, UserRecord,
};

#[derive(Default)]
struct SessionRecord {
    document_id: DocumentId,
    user_id: UserId,
    color: String,
    position: u32,
    selection: Option<(u32, u32)>,
}

/// Everything the in-memory adapter needs, guarded by one lock — this is
/// a test double, not a concurrency-tuned implementation.
#[derive(Default)]
struct State {
    documents: HashMap<DocumentId, DocumentRecord>,
    grants: HashMap<(DocumentId, UserId), AccessRole>,
    users: HashMap<String, UserRecord>,
    operations: HashMap<DocumentId, Vec<OperationRecord>>,
    sessions: HashMap<ClientId, SessionRecord>,
    offline_queues: HashMap<(ClientId, DocumentId), Vec<OfflineQueueEntry>>,
}

pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Test/seed helper: register a document with its owner.
    pub fn seed_document(&self, id: DocumentId, owner_id: UserId) {
        let mut state = self.state.write().unwrap();
        state.documents.insert(
            id,
            DocumentRecord {
                id,
                owner_id,
                snapshot_state: None,
                snapshot_version: None,
            },
        );
    }

    /// Test/seed helper: grant a non-owner user access to a document.
    pub fn seed_grant(&self, document_id: DocumentId, user_id: UserId) {
        self.state
            .write()
            .unwrap()
            .grants
            .insert((document_id, user_id), AccessRole::Grant);
    }

    /// Test/seed helper: register a user resolvable by `openId`.
    pub fn seed_user(&self, open_id: &str, user: UserRecord) {
        self.state.write().unwrap().users.insert(open_id.to_string(), user);
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryStorage {
    async fn get_document(&self, document_id: DocumentId) -> Result<Option<DocumentRecord>, StorageError> {
        Ok(self.state.read().unwrap().documents.get(&document_id).cloned())
    }

    async fn check_document_access(
        &self,
        document_id: DocumentId,
        user_id: UserId,
    ) -> Result<Option<AccessRole>, StorageError> {
        let state = self.state.read().unwrap();
        if let Some(doc) = state.documents.get(&document_id) {
            if doc.owner_id == user_id {
                return Ok(Some(AccessRole::Owner));
            }
        }
        Ok(state.grants.get(&(document_id, user_id)).copied())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStorage {
    async fn get_user_by_open_id(&self, open_id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.state.read().unwrap().users.get(open_id).cloned())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn add_operation(&self, op: OperationRecord) -> Result<(), StorageError> {
        self.state
            .write()
            .unwrap()
            .operations
            .entry(op.document_id)
            .or_default()
            .push(op);
        Ok(())
    }

    async fn get_operations_since(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> Result<Vec<OperationRecord>, StorageError> {
        let state = self.state.read().unwrap();
        Ok(state
            .operations
            .get(&document_id)
            .map(|ops| ops.iter().filter(|op| op.version > version).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_session(
        &self,
        document_id: DocumentId,
        user_id: UserId,
        client_id: ClientId,
        color: &str,
    ) -> Result<(), StorageError> {
        self.state.write().unwrap().sessions.insert(
            client_id,
            SessionRecord {
                document_id,
                user_id,
                color: color.to_string(),
                position: 0,
                selection: None,
            },
        );
        Ok(())
    }

    async fn delete_session(&self, client_id: &ClientId) -> Result<(), StorageError> {
        self.state.write().unwrap().sessions.remove(client_id);
        Ok(())
    }

    async fn update_session_cursor(
        &self,
        client_id: &ClientId,
        position: u32,
        selection: Option<(u32, u32)>,
    ) -> Result<(), StorageError> {
        if let Some(session) = self.state.write().unwrap().sessions.get_mut(client_id) {
            session.position = position;
            session.selection = selection;
        }
        Ok(())
    }

    async fn update_document_snapshot(
        &self,
        document_id: DocumentId,
        state_bytes: &[u8],
        version: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().unwrap();
        let doc = state
            .documents
            .entry(document_id)
            .or_insert_with(|| DocumentRecord {
                id: document_id,
                owner_id: UserId::default(),
                snapshot_state: None,
                snapshot_version: None,
            });
        doc.snapshot_state = Some(state_bytes.to_vec());
        doc.snapshot_version = Some(version);
        Ok(())
    }

    async fn add_offline_operation(&self, entry: OfflineQueueEntry) -> Result<(), StorageError> {
        self.state
            .write()
            .unwrap()
            .offline_queues
            .entry((entry.client_id.clone(), entry.document_id))
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn get_offline_queue(
        &self,
        client_id: &ClientId,
        document_id: DocumentId,
    ) -> Result<Vec<OfflineQueueEntry>, StorageError> {
        let state = self.state.read().unwrap();
        let mut queue = state
            .offline_queues
            .get(&(client_id.clone(), document_id))
            .cloned()
            .unwrap_or_default();
        queue.sort_by_key(|e| e.sequence_number);
        Ok(queue)
    }

    async fn clear_offline_queue(&self, client_id: &ClientId, document_id: DocumentId) -> Result<(), StorageError> {
        self.state
            .write()
            .unwrap()
            .offline_queues
            .remove(&(client_id.clone(), document_id));
        Ok(())
    }
}
