//! Storage backend selection (§6.3): read `DATABASE_URL`, and degrade to
//! an in-memory adapter rather than refusing to start when it is absent
//! or unreachable.

use std::sync::Arc;

use crate::backend::persistence::memory::InMemoryStorage;
use crate::backend::persistence::sqlx_store::SqlxStorage;
use crate::backend::persistence::{MetadataStore, Storage, UserDirectory};

pub struct StorageBundle {
    pub storage: Arc<dyn Storage>,
    pub metadata: Arc<dyn MetadataStore>,
    pub users: Arc<dyn UserDirectory>,
}

/// Connect to Postgres if `DATABASE_URL` is set and reachable; otherwise
/// fall back to the in-memory adapter so local development and tests
/// never require a database.
pub async fn load_storage(database_url: Option<&str>) -> StorageBundle {
    if let Some(url) = database_url {
        tracing::info!("connecting to storage backend...");
        match SqlxStorage::connect(url).await {
            Ok(storage) => {
                tracing::info!("storage backend connected and migrated");
                let storage = Arc::new(storage);
                return StorageBundle {
                    storage: storage.clone(),
                    metadata: storage.clone(),
                    users: storage,
                };
            }
            Err(e) => {
                tracing::error!("failed to connect to storage backend: {e}");
                tracing::warn!("falling back to in-memory storage");
            }
        }
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory storage");
    }

    let storage = Arc::new(InMemoryStorage::new());
    StorageBundle {
        storage: storage.clone(),
        metadata: storage.clone(),
        users: storage,
    }
}
