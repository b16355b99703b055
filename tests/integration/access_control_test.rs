//! `join_room` step 3-4: resolve the Room via the registry, then deny
//! access to a user holding neither ownership nor an explicit grant.

use roomsync::backend::persistence::{AccessRole, MetadataStore};
use roomsync::backend::registry::RoomRegistry;
use roomsync::shared::config::AppConfig;
use roomsync::shared::ids::{DocumentId, UserId};

use crate::common::seeded_storage;

#[tokio::test]
async fn owner_is_granted_access_to_their_document() {
    let storage = seeded_storage(DocumentId(1), UserId(1), UserId(2));
    let registry = RoomRegistry::new(AppConfig::default());

    registry.get_or_create(DocumentId(1), &storage, &storage).await.unwrap();
    let role = storage.check_document_access(DocumentId(1), UserId(1)).await.unwrap();
    assert_eq!(role, Some(AccessRole::Owner));
}

#[tokio::test]
async fn a_user_without_a_grant_is_denied() {
    let storage = seeded_storage(DocumentId(1), UserId(1), UserId(2));
    let role = storage.check_document_access(DocumentId(1), UserId(2)).await.unwrap();
    assert_eq!(role, None);
}

#[tokio::test]
async fn a_granted_collaborator_is_allowed() {
    let storage = seeded_storage(DocumentId(1), UserId(1), UserId(2));
    storage.seed_grant(DocumentId(1), UserId(2));
    let role = storage.check_document_access(DocumentId(1), UserId(2)).await.unwrap();
    assert_eq!(role, Some(AccessRole::Grant));
}

#[tokio::test]
async fn joining_an_unknown_document_fails_with_not_found() {
    let storage = seeded_storage(DocumentId(1), UserId(1), UserId(2));
    let registry = RoomRegistry::new(AppConfig::default());

    let err = registry.get_or_create(DocumentId(999), &storage, &storage).await;
    assert!(err.is_err());
}
