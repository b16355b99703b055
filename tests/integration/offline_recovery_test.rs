//! §4.7: a client's queued updates are replayed through the normal
//! apply path on reconnect, in sequence order, and the queue is
//! cleared afterward.

use roomsync::backend::crdt::CrdtEngine;
use roomsync::backend::offline::recover_queue;
use roomsync::backend::persistence::memory::InMemoryStorage;
use roomsync::backend::persistence::{OfflineQueueEntry, Storage};
use roomsync::backend::room::RoomHandle;
use roomsync::shared::config::AppConfig;
use roomsync::shared::ids::{ClientId, DocumentId};

#[tokio::test]
async fn queued_updates_replay_in_order_and_the_queue_drains() {
    let storage = InMemoryStorage::new();
    let room = RoomHandle::new(DocumentId(5), &AppConfig::default(), None, 0, Vec::new()).unwrap();
    let client_id = ClientId("alice".into());

    let mut base = CrdtEngine::new("alice");
    base.insert_local(0, "a");
    let first = base.encode_full_state();

    let mut next = CrdtEngine::from_encoded("alice", &first).unwrap();
    next.insert_local(1, "b");
    let second = next.encode_full_state();

    for (seq, bytes) in [(2, second), (1, first)] {
        storage
            .add_offline_operation(OfflineQueueEntry {
                client_id: client_id.clone(),
                document_id: DocumentId(5),
                bytes,
                sequence_number: seq,
            })
            .await
            .unwrap();
    }

    let outcome = recover_queue(&room, &storage, &client_id, DocumentId(5)).await.unwrap();
    assert_eq!(outcome.recovered, 2);
    assert_eq!(outcome.conflicts, 0);
    assert_eq!(room.content().await, "ab");

    assert!(storage.get_offline_queue(&client_id, DocumentId(5)).await.unwrap().is_empty());
}
