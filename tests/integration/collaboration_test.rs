//! Two clients editing the same document converge, a reconnecting
//! client with the same `ClientId` evicts its stale session, and
//! cursor updates fan out to other members.

use std::time::Instant;

use pretty_assertions::assert_eq;
use roomsync::backend::crdt::CrdtEngine;
use roomsync::backend::persistence::memory::InMemoryStorage;
use roomsync::backend::room::{RoomHandle, Session};
use roomsync::shared::config::AppConfig;
use roomsync::shared::ids::{ClientId, DocumentId, UserId};

fn session(client_id: &str, user_id: i64) -> Session {
    Session {
        client_id: ClientId(client_id.to_string()),
        user_id: UserId(user_id),
        document_id: DocumentId(1),
        color: "#e06c75".into(),
        name: None,
        position: 0,
        selection: None,
        last_heartbeat: Instant::now(),
    }
}

#[tokio::test]
async fn two_clients_converge_regardless_of_apply_order() {
    let storage = InMemoryStorage::new();
    let config = AppConfig::default();
    let room = RoomHandle::new(DocumentId(1), &config, None, 0, Vec::new()).unwrap();

    room.admit(session("alice", 1)).await;
    room.admit(session("bob", 2)).await;

    let mut alice_doc = CrdtEngine::new("alice");
    alice_doc.insert_local(0, "Hello ");
    let alice_update = alice_doc.encode_full_state();

    room.apply_remote(&alice_update, &ClientId("alice".into()), &storage)
        .await
        .unwrap();

    let mut bob_doc = CrdtEngine::from_encoded("bob", &alice_update).unwrap();
    bob_doc.insert_local(6, "World");
    let bob_update = bob_doc.encode_full_state();

    room.apply_remote(&bob_update, &ClientId("bob".into()), &storage)
        .await
        .unwrap();

    assert_eq!(room.content().await, "Hello World");
}

#[tokio::test]
async fn reconnecting_with_the_same_client_id_evicts_the_stale_session() {
    let config = AppConfig::default();
    let room = RoomHandle::new(DocumentId(1), &config, None, 0, Vec::new()).unwrap();

    room.admit(session("alice", 1)).await;
    assert_eq!(room.member_count().await, 1);

    let reconnect = room.admit(session("alice", 1)).await;
    assert_eq!(reconnect.evicted, Some(ClientId("alice".into())));
    assert_eq!(room.member_count().await, 1);
}

#[tokio::test]
async fn cursor_updates_are_tracked_per_session() {
    let config = AppConfig::default();
    let room = RoomHandle::new(DocumentId(1), &config, None, 0, Vec::new()).unwrap();

    room.admit(session("alice", 1)).await;
    room.admit(session("bob", 2)).await;

    let payload = room
        .update_cursor(&ClientId("alice".into()), 12, Some((10, 14)))
        .await
        .unwrap();

    assert_eq!(payload.position, 12);
    assert_eq!(payload.selection, Some((10, 14)));

    // Updating a client_id that isn't a member is a no-op, not a panic.
    assert!(room.update_cursor(&ClientId("ghost".into()), 0, None).await.is_none());
}
