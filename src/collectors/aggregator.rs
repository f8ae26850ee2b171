use std::sync::Arc;

use super::{JobSource, KeywordCache};
use crate::models::job::FlatRow;

/// Merges every source's results per keyword and caches them.
pub struct Aggregator {
    sources: Vec<Arc<dyn JobSource>>,
    cache: Arc<KeywordCache>,
}

impl Aggregator {
    /// `sources` must already be in priority order.
    pub fn new(sources: Vec<Arc<dyn JobSource>>, cache: Arc<KeywordCache>) -> Self {
        Self { sources, cache }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Rows for a comma-separated keyword list, keyword by keyword in input order.
    pub async fn search(&self, input: &str) -> Vec<FlatRow> {
        let mut rows = Vec::new();
        for keyword in split_keywords(input) {
            rows.extend(self.resolve(&keyword).await);
        }
        rows
    }

    /// Rows for one keyword, scraping every source on a cache miss.
    pub async fn resolve(&self, keyword: &str) -> Vec<FlatRow> {
        self.cache
            .get_or_fetch(keyword, || self.scrape_all(keyword))
            .await
    }

    /// Keywords with cached results, sorted.
    pub fn cached_keywords(&self) -> Vec<String> {
        self.cache.keywords()
    }

    /// Previously resolved rows for a keyword; `None` when never searched.
    pub fn lookup(&self, keyword: &str) -> Option<Vec<FlatRow>> {
        self.cache.get(keyword.trim())
    }

    /// Previously resolved rows for a keyword; empty when never searched.
    pub fn cached(&self, keyword: &str) -> Vec<FlatRow> {
        self.lookup(keyword).unwrap_or_default()
    }

    async fn scrape_all(&self, keyword: &str) -> Vec<FlatRow> {
        tracing::info!("Cache miss for '{keyword}', scraping {} sources", self.sources.len());
        let mut rows = Vec::new();
        for source in &self.sources {
            match source.scrape_keyword(keyword).await {
                Ok(found) => {
                    tracing::info!(
                        "{} returned {} rows for '{keyword}'",
                        source.name(),
                        found.len()
                    );
                    rows.extend(found);
                }
                Err(e) => {
                    tracing::error!("{} failed for '{keyword}': {e}", source.name());
                }
            }
        }
        rows
    }
}

/// Split on commas, trimming each keyword and dropping empty ones.
pub fn split_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
