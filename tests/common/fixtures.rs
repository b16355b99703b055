//! Fixtures for exercising the collaboration core without a live
//! database: a seeded in-memory storage backend, and a JWT minted
//! against a known secret so `JwtVerifier` accepts it.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use roomsync::backend::persistence::memory::InMemoryStorage;
use roomsync::backend::persistence::UserRecord;
use roomsync::shared::ids::{DocumentId, UserId};

pub const TEST_JWT_SECRET: &str = "fixture-secret";

#[derive(serde::Serialize)]
struct Claims {
    #[serde(rename = "openId")]
    open_id: String,
    exp: u64,
}

/// Mint a token `JwtVerifier::new(TEST_JWT_SECRET)` will accept for the
/// next hour.
pub fn mint_token(open_id: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    let claims = Claims {
        open_id: open_id.to_string(),
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_ref())).unwrap()
}

/// An in-memory storage backend with one document owned by `owner`, and
/// both `owner` and `collaborator` registered as resolvable users.
pub fn seeded_storage(document_id: DocumentId, owner: UserId, collaborator: UserId) -> InMemoryStorage {
    let storage = InMemoryStorage::new();
    storage.seed_document(document_id, owner);
    storage.seed_user(
        "owner",
        UserRecord {
            id: owner,
            name: "Owner".into(),
            open_id: "owner".into(),
        },
    );
    storage.seed_user(
        "collaborator",
        UserRecord {
            id: collaborator,
            name: "Collaborator".into(),
            open_id: "collaborator".into(),
        },
    );
    storage
}
