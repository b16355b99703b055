//! Router assembly: one WebSocket endpoint plus static file serving
//! (custom routes first, static files nested, a fallback last).

use axum::Router;
use tower_http::services::ServeDir;

use crate::backend::connection::ws_handler;
use crate::backend::server::state::AppState;

pub fn create_router(app_state: AppState) -> Router<()> {
    Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .nest_service("/static", ServeDir::new("public"))
        .fallback(|| async { "404 Not Found" })
        .with_state(app_state)
}
