pub mod export;
pub mod search;

use axum::Router;
use axum::routing::get;

use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(search::home))
        .route("/search", get(search::search))
        .route("/export", get(export::export))
        .with_state(state)
}
