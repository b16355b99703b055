//! Application state shared across every WebSocket connection (§4, §6).
//!
//! `AppState` is the single `Clone`-able handle Axum threads through its
//! extractors — every field is already cheaply cloneable (`Arc`, or a
//! type that is itself a handle around one).

use std::sync::Arc;

use crate::backend::auth::TokenVerifier;
use crate::backend::persistence::{MetadataStore, Storage, UserDirectory};
use crate::backend::registry::RoomRegistry;
use crate::shared::config::AppConfig;
use crate::shared::ids::ColorAssigner;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub storage: Arc<dyn Storage>,
    pub metadata: Arc<dyn MetadataStore>,
    pub users: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub colors: Arc<ColorAssigner>,
    pub config: AppConfig,
}
