use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{JobSource, Overrides, encode_keyword, flatten_all};
use crate::error::ScrapeError;
use crate::extract::posting_board::{self, ORIGIN};
use crate::fetch::{FetchOptions, PageFetcher};
use crate::models::job::FlatRow;

/// Korean-language markers the board's block page uses, on top of the defaults.
const BOT_MARKERS: &[&str] = &["captcha", "robot", "cloudflare", "로봇", "자동화"];

/// Company-posting board. Cards load while scrolling.
pub struct PostingBoard {
    fetcher: Arc<dyn PageFetcher>,
    options: FetchOptions,
}

impl PostingBoard {
    pub fn new(fetcher: Arc<dyn PageFetcher>, overrides: Overrides) -> Self {
        let options = FetchOptions {
            scroll_count: 5,
            scroll_delay: Duration::from_millis(1500),
            retry_count: 2,
            ready_marker: Some("JobCard_container".to_string()),
            bot_markers: BOT_MARKERS.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        Self {
            fetcher,
            options: overrides.apply(options),
        }
    }

    pub fn search_url(keyword: &str) -> String {
        format!(
            "{ORIGIN}/search?query={}&tab=position",
            encode_keyword(keyword.trim())
        )
    }
}

#[async_trait]
impl JobSource for PostingBoard {
    fn name(&self) -> &str {
        "wanted"
    }

    async fn scrape_keyword(&self, keyword: &str) -> Result<Vec<FlatRow>, ScrapeError> {
        let url = Self::search_url(keyword);
        tracing::info!("Scraping {} for '{keyword}': {url}", self.name());

        let content = match self.fetcher.fetch(&url, &self.options).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("No content for '{keyword}' from {}: {e}", self.name());
                return Ok(Vec::new());
            }
        };

        let rows = flatten_all(self.name(), &posting_board::extract(&content));
        tracing::info!("{}: {} jobs for '{keyword}'", self.name(), rows.len());
        Ok(rows)
    }
}
