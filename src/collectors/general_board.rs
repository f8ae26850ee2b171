use std::sync::Arc;

use async_trait::async_trait;

use super::{JobSource, Overrides, encode_keyword, flatten_all};
use crate::error::ScrapeError;
use crate::extract::general_board::{self, ORIGIN};
use crate::fetch::{FetchOptions, PageFetcher};
use crate::models::job::FlatRow;

/// Upper bound on pages walked for one keyword.
const MAX_PAGES: usize = 20;

/// The general board flags bot traffic with a Cloudflare challenge page.
const BOT_MARKERS: &[&str] = &["captcha", "challenge-platform"];

/// General remote job board: static, paginated search results.
pub struct GeneralBoard {
    fetcher: Arc<dyn PageFetcher>,
    options: FetchOptions,
}

impl GeneralBoard {
    pub fn new(fetcher: Arc<dyn PageFetcher>, overrides: Overrides) -> Self {
        let options = FetchOptions {
            retry_count: 1,
            bot_markers: BOT_MARKERS.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        Self {
            fetcher,
            options: overrides.apply(options),
        }
    }

    pub fn search_url(keyword: &str, page: usize) -> String {
        format!(
            "{ORIGIN}/remote-jobs/search?term={}&page={page}",
            encode_keyword(keyword.trim())
        )
    }

    /// Pages advertised for the keyword, with page 1's content when it loaded.
    /// Counts 1 page when the lookup fails.
    async fn first_page(&self, keyword: &str) -> (usize, Option<String>) {
        let url = Self::search_url(keyword, 1);
        match self.fetcher.fetch(&url, &self.options).await {
            Ok(html) => (general_board::page_count(&html).min(MAX_PAGES), Some(html)),
            Err(e) => {
                tracing::warn!("Page count lookup for '{keyword}' failed ({e}), assuming 1 page");
                (1, None)
            }
        }
    }
}

#[async_trait]
impl JobSource for GeneralBoard {
    fn name(&self) -> &str {
        "wwr"
    }

    async fn scrape_keyword(&self, keyword: &str) -> Result<Vec<FlatRow>, ScrapeError> {
        let (pages, mut first_page) = self.first_page(keyword).await;
        tracing::info!("Scraping {} for '{keyword}': {pages} page(s)", self.name());

        let mut rows = Vec::new();
        for page in 1..=pages {
            let html = match first_page.take() {
                Some(html) => html,
                None => {
                    let url = Self::search_url(keyword, page);
                    match self.fetcher.fetch(&url, &self.options).await {
                        Ok(html) => html,
                        Err(e) => {
                            tracing::warn!("Skipping page {page}/{pages} of '{keyword}': {e}");
                            continue;
                        }
                    }
                }
            };

            let jobs = general_board::extract(&html);
            tracing::info!("Page {page}/{pages}: {} jobs", jobs.len());
            rows.extend(flatten_all(self.name(), &jobs));
        }

        tracing::info!("{}: {} jobs for '{keyword}'", self.name(), rows.len());
        Ok(rows)
    }
}
