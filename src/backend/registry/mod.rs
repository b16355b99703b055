//! Room Registry (§4.2): the process-wide map from `DocumentId` to the
//! single live `RoomHandle` for that document, with race-free
//! construction-on-demand and drop-when-idle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::error::BackendError;
use crate::backend::persistence::{MetadataStore, Storage};
use crate::backend::room::RoomHandle;
use crate::shared::config::AppConfig;
use crate::shared::ids::DocumentId;

/// Holds every currently-active Room. A single `Mutex` around the map is
/// enough: the expensive per-document work (CRDT apply, broadcast) lives
/// behind each Room's own lock, so this map is only ever held for the
/// short get-or-construct / drop critical sections.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<DocumentId, RoomHandle>>>,
    config: AppConfig,
}

impl RoomRegistry {
    pub fn new(config: AppConfig) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Return the live Room for `document_id`, constructing it from the
    /// persisted snapshot and trailing operation log if it is not
    /// already resident. Two concurrent callers racing on the same
    /// `document_id` never construct two Rooms: the registry lock is
    /// held for the whole get-or-build step.
    pub async fn get_or_create(
        &self,
        document_id: DocumentId,
        storage: &(dyn Storage + Send + Sync),
        metadata: &(dyn MetadataStore + Send + Sync),
    ) -> Result<RoomHandle, BackendError> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(&document_id) {
            return Ok(room.clone());
        }

        let document = metadata
            .get_document(document_id)
            .await
            .map_err(|e| BackendError::server_error(e.to_string()))?
            .ok_or_else(|| BackendError::not_found(format!("document {document_id}")))?;

        let snapshot_version = document.snapshot_version.unwrap_or(0);
        let trailing_operations = storage
            .get_operations_since(document_id, snapshot_version)
            .await
            .map_err(|e| BackendError::server_error(e.to_string()))?;

        let room = RoomHandle::new(
            document_id,
            &self.config,
            document.snapshot_state.as_deref(),
            snapshot_version,
            trailing_operations,
        )?;

        rooms.insert(document_id, room.clone());
        Ok(room)
    }

    /// Drop a Room that has become idle. Checkpoints it first so no
    /// buffered operations are lost. Re-checks emptiness under the
    /// registry lock so a client racing to join right as the last member
    /// leaves cannot be dropped out from under it.
    pub async fn drop_if_empty(&self, document_id: DocumentId, storage: &(dyn Storage + Send + Sync)) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(&document_id).cloned() else {
            return;
        };
        if !room.is_empty().await {
            return;
        }
        if let Err(e) = room.checkpoint(storage).await {
            tracing::warn!("failed to checkpoint room {document_id} before eviction: {e}");
        }
        rooms.remove(&document_id);
    }

    pub async fn active_room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// All currently-resident rooms, for periodic checkpoint/cleanup tasks.
    pub async fn snapshot_rooms(&self) -> Vec<RoomHandle> {
        self.rooms.lock().await.values().cloned().collect()
    }
}
