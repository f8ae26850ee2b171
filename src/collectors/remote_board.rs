use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{JobSource, Overrides, encode_keyword, flatten_all};
use crate::error::ScrapeError;
use crate::extract::remote_board::{self, ORIGIN};
use crate::fetch::{FetchOptions, PageFetcher};
use crate::models::job::FlatRow;

/// Remote-jobs board. Listings render client-side, so it needs a browser,
/// and the board is quick to serve bot checks.
pub struct RemoteBoard {
    fetcher: Arc<dyn PageFetcher>,
    options: FetchOptions,
}

impl RemoteBoard {
    pub fn new(fetcher: Arc<dyn PageFetcher>, overrides: Overrides) -> Self {
        let options = FetchOptions {
            scroll_count: 4,
            scroll_delay: Duration::from_secs(5),
            retry_count: 2,
            ready_marker: Some("jobsboard".to_string()),
            ..Default::default()
        };
        Self {
            fetcher,
            options: overrides.apply(options),
        }
    }

    pub fn search_url(keyword: &str) -> String {
        let slug = keyword
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        format!("{ORIGIN}/remote-{}-jobs", encode_keyword(&slug))
    }
}

#[async_trait]
impl JobSource for RemoteBoard {
    fn name(&self) -> &str {
        "remoteok"
    }

    async fn scrape_keyword(&self, keyword: &str) -> Result<Vec<FlatRow>, ScrapeError> {
        let url = Self::search_url(keyword);
        tracing::info!("Scraping {} for '{keyword}': {url}", self.name());

        // Direct first; a full proxied round only when that fails.
        let content = match self.fetcher.fetch(&url, &self.options.with_proxy(false)).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Direct fetch of {url} failed ({e}), retrying through proxies");
                match self.fetcher.fetch(&url, &self.options.with_proxy(true)).await {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!("No content for '{keyword}' from {}: {e}", self.name());
                        return Ok(Vec::new());
                    }
                }
            }
        };

        let rows = flatten_all(self.name(), &remote_board::extract(&content));
        tracing::info!("{}: {} jobs for '{keyword}'", self.name(), rows.len());
        Ok(rows)
    }
}
