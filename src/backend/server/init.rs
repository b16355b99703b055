//! Server initialization: build `AppState`, start the periodic
//! checkpoint task, and assemble the router — build state, spawn a
//! background maintenance task, hand back a ready `Router`.

use std::sync::Arc;

use axum::Router;

use crate::backend::auth::JwtVerifier;
use crate::backend::registry::RoomRegistry;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_storage;
use crate::backend::server::state::AppState;
use crate::shared::config::AppConfig;
use crate::shared::ids::ColorAssigner;

pub async fn create_app() -> Router<()> {
    tracing::info!("initializing collaboration core server");

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("invalid configuration: {e}");
    }

    let bundle = load_storage(config.database_url.as_deref()).await;

    let app_state = AppState {
        rooms: RoomRegistry::new(config.clone()),
        storage: bundle.storage,
        metadata: bundle.metadata,
        users: bundle.users,
        verifier: Arc::new(JwtVerifier::from_env()),
        colors: Arc::new(ColorAssigner::new()),
        config: config.clone(),
    };

    spawn_checkpoint_task(app_state.clone());

    let app = create_router(app_state);
    tracing::info!("router configured");
    app
}

/// Periodically checkpoint every resident Room (§4.6 "periodic timer").
/// Idle rooms are also dropped here so a Room does not outlive its last
/// member by more than one sweep interval.
fn spawn_checkpoint_task(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.snapshot_interval);
        loop {
            interval.tick().await;
            let rooms = state.rooms.snapshot_rooms().await;
            for room in rooms {
                if let Err(e) = room.checkpoint(state.storage.as_ref()).await {
                    tracing::warn!("periodic checkpoint failed for document {}: {e}", room.document_id());
                }
                state.rooms.drop_if_empty(room.document_id(), state.storage.as_ref()).await;
            }
            tracing::debug!("periodic checkpoint sweep complete, {} rooms active", state.rooms.active_room_count().await);
        }
    });
}
