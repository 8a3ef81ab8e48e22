pub mod auth;
pub mod calendar;
pub mod stream;
pub mod watch;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Assemble the full route table. CORS and other layers are applied by the
/// caller so tests can drive the bare router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(calendar::router())
        .merge(watch::router())
        .merge(webhook::router())
        .merge(stream::router())
        .with_state(state)
}
