//! Offline Recovery (§4.7): replay a reconnecting client's queued
//! updates through the normal apply path, in sequence order, then clear
//! the queue.

use crate::backend::error::BackendError;
use crate::backend::persistence::Storage;
use crate::backend::room::RoomHandle;
use crate::shared::ids::{ClientId, DocumentId};

pub struct RecoveryOutcome {
    pub recovered: usize,
    pub conflicts: usize,
}

/// Drain `client_id`'s offline queue for `document_id` through
/// `room.apply_remote`, in ascending sequence-number order (the
/// ordering `get_offline_queue` already guarantees). An update the CRDT
/// engine rejects is counted as a conflict rather than aborting the
/// whole recovery — the client sent it before disconnecting and it may
/// simply be stale against what has since landed.
pub async fn recover_queue(
    room: &RoomHandle,
    storage: &(dyn Storage + Send + Sync),
    client_id: &ClientId,
    document_id: DocumentId,
) -> Result<RecoveryOutcome, BackendError> {
    let queue = storage
        .get_offline_queue(client_id, document_id)
        .await
        .map_err(|e| BackendError::server_error(e.to_string()))?;

    let mut recovered = 0;
    let mut conflicts = 0;
    for entry in &queue {
        match room.apply_remote(&entry.bytes, client_id, storage).await {
            Ok(_) => recovered += 1,
            Err(_) => conflicts += 1,
        }
    }

    storage
        .clear_offline_queue(client_id, document_id)
        .await
        .map_err(|e| BackendError::server_error(e.to_string()))?;

    Ok(RecoveryOutcome { recovered, conflicts })
}
