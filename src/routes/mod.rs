pub mod api;
pub mod ui;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::collectors::{Aggregator, encode_keyword};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// All routes, without the tracing/CORS layers added by `main`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(ui::router(state.clone()))
        .merge(api::router(state))
}

pub(crate) fn search_href(keyword: &str) -> String {
    format!("/search?keyword={}", encode_keyword(keyword))
}

pub(crate) fn export_href(keyword: &str, source: Option<&str>) -> String {
    let mut href = format!("/export?keyword={}", encode_keyword(keyword));
    if let Some(source) = source {
        href.push_str("&source=");
        href.push_str(&encode_keyword(source));
    }
    href
}
