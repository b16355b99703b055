//! §4.6: a checkpoint persists the full CRDT state, and a Room rebuilt
//! from that snapshot (plus any trailing operations) reconstructs the
//! same content.

use roomsync::backend::crdt::CrdtEngine;
use roomsync::backend::persistence::memory::InMemoryStorage;
use roomsync::backend::persistence::MetadataStore;
use roomsync::backend::registry::RoomRegistry;
use roomsync::backend::room::{RoomHandle, Session};
use roomsync::shared::config::AppConfig;
use roomsync::shared::ids::{ClientId, DocumentId, UserId};

#[tokio::test]
async fn a_room_rebuilt_from_its_snapshot_reconstructs_the_same_content() {
    let storage = InMemoryStorage::new();
    storage.seed_document(DocumentId(1), UserId(1));

    let room = RoomHandle::new(DocumentId(1), &AppConfig::default(), None, 0, Vec::new()).unwrap();
    room.admit(Session {
        client_id: ClientId("alice".into()),
        user_id: UserId(1),
        document_id: DocumentId(1),
        color: "#e06c75".into(),
        name: None,
        position: 0,
        selection: None,
        last_heartbeat: std::time::Instant::now(),
    })
    .await;

    let mut edit = CrdtEngine::new("alice");
    edit.insert_local(0, "durable");
    let update = edit.encode_full_state();
    room.apply_remote(&update, &ClientId("alice".into()), &storage).await.unwrap();
    room.checkpoint(&storage).await.unwrap();

    let document = storage.get_document(DocumentId(1)).await.unwrap().unwrap();
    assert!(document.snapshot_state.is_some());

    let rebuilt = RoomHandle::new(
        DocumentId(1),
        &AppConfig::default(),
        document.snapshot_state.as_deref(),
        document.snapshot_version.unwrap(),
        Vec::new(),
    )
    .unwrap();

    assert_eq!(rebuilt.content().await, "durable");
}

#[tokio::test]
async fn get_or_create_resumes_from_a_persisted_snapshot() {
    let storage = InMemoryStorage::new();
    storage.seed_document(DocumentId(2), UserId(1));
    let registry = RoomRegistry::new(AppConfig::default());

    let first_room = registry.get_or_create(DocumentId(2), &storage, &storage).await.unwrap();
    let mut edit = CrdtEngine::new("alice");
    edit.insert_local(0, "persisted");
    let update = edit.encode_full_state();
    first_room.apply_remote(&update, &ClientId("alice".into()), &storage).await.unwrap();
    first_room.checkpoint(&storage).await.unwrap();

    // A fresh registry simulates the Room having been evicted and needing
    // to be reconstructed from storage alone.
    let fresh_registry = RoomRegistry::new(AppConfig::default());
    let resumed = fresh_registry.get_or_create(DocumentId(2), &storage, &storage).await.unwrap();
    assert_eq!(resumed.content().await, "persisted");
}
