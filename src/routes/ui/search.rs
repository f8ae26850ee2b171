use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Local;
use serde::Deserialize;

use crate::collectors::aggregator::split_keywords;
use crate::error::AppError;
use crate::models::job::FlatRow;
use crate::routes::{AppState, export_href, search_href};

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    sources: Vec<String>,
    recent: Vec<Link>,
}

/// Consecutive rows that share one column layout.
struct ResultTable {
    source: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A labelled link to a search or an export.
struct Link {
    label: String,
    href: String,
}

#[derive(Template)]
#[template(path = "search.html")]
struct SearchTemplate {
    keyword: String,
    count: usize,
    searched_at: String,
    tables: Vec<ResultTable>,
    exports: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

pub async fn home(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let tmpl = HomeTemplate {
        sources: state
            .aggregator
            .source_names()
            .into_iter()
            .map(String::from)
            .collect(),
        recent: state
            .aggregator
            .cached_keywords()
            .into_iter()
            .map(|keyword| Link {
                href: search_href(&keyword),
                label: keyword,
            })
            .collect(),
    };
    Ok(Html(
        tmpl.render()
            .map_err(|e| AppError::Internal(e.to_string()))?,
    ))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let input = query.keyword.unwrap_or_default();
    let keywords = split_keywords(&input);
    if keywords.is_empty() {
        tracing::warn!("Search with empty keyword, redirecting home");
        return Ok(Redirect::to("/").into_response());
    }

    let rows = state.aggregator.search(&input).await;

    let mut exports = Vec::new();
    for keyword in &keywords {
        exports.push(Link {
            label: keyword.clone(),
            href: export_href(keyword, None),
        });
        for source in state.aggregator.source_names() {
            exports.push(Link {
                label: format!("{keyword} ({source})"),
                href: export_href(keyword, Some(source)),
            });
        }
    }

    let tmpl = SearchTemplate {
        keyword: keywords.join(", "),
        count: rows.len(),
        searched_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        tables: group_rows(rows),
        exports,
    };
    Ok(Html(
        tmpl.render()
            .map_err(|e| AppError::Internal(e.to_string()))?,
    )
    .into_response())
}

fn group_rows(rows: Vec<FlatRow>) -> Vec<ResultTable> {
    let mut tables: Vec<ResultTable> = Vec::new();
    for row in rows {
        match tables.last_mut() {
            Some(table) if table.source == row.source && table.headers == row.headers => {
                table.rows.push(row.cells);
            }
            _ => tables.push(ResultTable {
                source: row.source,
                headers: row.headers,
                rows: vec![row.cells],
            }),
        }
    }
    tables
}
