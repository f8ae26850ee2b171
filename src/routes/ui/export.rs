use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Local;
use serde::Deserialize;

use crate::error::AppError;
use crate::export::{self, ExportError};
use crate::routes::{AppState, search_href};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub keyword: Option<String>,
    pub source: Option<String>,
}

/// Download cached results for one keyword as CSV. Never triggers a scrape.
pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let Some(keyword) = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    else {
        tracing::warn!("Export requested without keyword");
        return Ok(Redirect::to("/").into_response());
    };
    let source = query
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let rows = state.aggregator.cached(keyword);
    match export::export_csv(&rows, source, keyword, Local::now()) {
        Ok(csv) => {
            tracing::info!("Exporting {} as {}", keyword, csv.filename);
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", csv.filename),
                ),
            ];
            Ok((headers, csv.content).into_response())
        }
        Err(ExportError::NoData) => {
            tracing::warn!("Nothing cached to export for '{keyword}'");
            Ok(Redirect::to(&search_href(keyword)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
