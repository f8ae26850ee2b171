use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collectors::aggregator::split_keywords;
use crate::error::AppError;
use crate::models::job::FlatRow;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub count: usize,
    pub searched_at: DateTime<Utc>,
    pub rows: Vec<FlatRow>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let input = query.keyword.unwrap_or_default();
    let keywords = split_keywords(&input);
    if keywords.is_empty() {
        return Err(AppError::BadRequest("keyword is required".to_string()));
    }

    let rows = state.aggregator.search(&input).await;
    Ok(Json(SearchResponse {
        keyword: keywords.join(", "),
        count: rows.len(),
        searched_at: Utc::now(),
        rows,
    }))
}

#[derive(Debug, Serialize)]
pub struct CachedResponse {
    pub keyword: String,
    pub count: usize,
    pub rows: Vec<FlatRow>,
}

/// Rows already cached for a keyword. Never scrapes.
pub async fn cached(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Result<Json<CachedResponse>, AppError> {
    let rows = state
        .aggregator
        .lookup(&keyword)
        .ok_or_else(|| AppError::NotFound(format!("No cached results for '{keyword}'")))?;
    Ok(Json(CachedResponse {
        keyword,
        count: rows.len(),
        rows,
    }))
}
