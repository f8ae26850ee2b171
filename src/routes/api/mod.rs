pub mod search;

use axum::Router;
use axum::routing::get;

use super::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/search", get(search::search))
        .route("/cache/{keyword}", get(search::cached))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}
