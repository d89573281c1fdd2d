//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod library;
pub mod stories;

/// Every route, with state applied. Middleware layers are added by the caller.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/stories", stories::router())
        .nest("/api/v1/library", library::router())
        .with_state(state)
}
