// Source adapters: one per job board, each turning a keyword into flattened
// rows by driving a page fetcher and the board's extractor.

pub mod aggregator;
pub mod cache;
pub mod general_board;
pub mod posting_board;
pub mod remote_board;
pub mod runner;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::fetch::browser::Renderer;
use crate::fetch::chrome::ChromeRenderer;
use crate::fetch::{
    BrowserFetcher, CaptchaGate, FetchOptions, HttpFetcher, PageFetcher, ProxyPool,
};
use crate::models::job::{FlatRow, JobRecord};

pub use aggregator::Aggregator;
pub use cache::KeywordCache;

/// Characters that encodeURIComponent does NOT encode.
/// RFC 3986 unreserved: A-Z a-z 0-9 - _ . ! ~ * ' ( )
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Trait that every job board adapter implements.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Short source name, used in logs and export filenames.
    fn name(&self) -> &str;

    /// Scrape all listings for one keyword. Fetch failures degrade to fewer
    /// rows; an `Err` means the adapter itself could not run.
    async fn scrape_keyword(&self, keyword: &str) -> Result<Vec<FlatRow>, ScrapeError>;
}

/// Supported boards. The declaration order is the result priority order.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Remote-jobs board (browser rendered)
    #[value(name = "remoteok")]
    RemoteOk,
    /// General remote job board (static HTML, paginated)
    Wwr,
    /// Company-posting board (browser rendered)
    Wanted,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::RemoteOk => "remoteok",
            SourceKind::Wwr => "wwr",
            SourceKind::Wanted => "wanted",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator settings layered over each source's own fetch defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub retry_count: Option<u32>,
    pub manual_captcha: bool,
}

impl Overrides {
    fn apply(&self, mut options: FetchOptions) -> FetchOptions {
        if let Some(retry_count) = self.retry_count {
            options.retry_count = retry_count;
        }
        options.manual_captcha = self.manual_captcha;
        options
    }
}

/// Build the configured sources in priority order, deduplicated.
pub fn build_sources(
    config: &Config,
    captcha: CaptchaGate,
) -> Result<Vec<Arc<dyn JobSource>>, ScrapeError> {
    let mut kinds = config.sources.clone();
    kinds.sort();
    kinds.dedup();
    if kinds.is_empty() {
        return Err(ScrapeError::Setup("no sources configured".to_string()));
    }

    let proxies = Arc::new(ProxyPool::new(config.proxies.clone()));
    if !proxies.is_empty() {
        tracing::info!("Proxy pool configured with {} endpoints", config.proxies.len());
    }
    let overrides = Overrides {
        retry_count: config.retry_count,
        manual_captcha: config.manual_captcha,
    };

    let renderer: Arc<dyn Renderer> = Arc::new(ChromeRenderer::new(config.headless));
    let browser: Arc<dyn PageFetcher> = Arc::new(
        BrowserFetcher::new(renderer, proxies.clone(), captcha)
            .with_artifacts_dir(config.artifacts_dir.clone())
            .with_navigation_timeout(Duration::from_secs(config.navigation_timeout)),
    );
    let http: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(proxies)?);

    let sources = kinds
        .into_iter()
        .map(|kind| -> Arc<dyn JobSource> {
            match kind {
                SourceKind::RemoteOk => {
                    Arc::new(remote_board::RemoteBoard::new(browser.clone(), overrides))
                }
                SourceKind::Wwr => {
                    Arc::new(general_board::GeneralBoard::new(http.clone(), overrides))
                }
                SourceKind::Wanted => {
                    Arc::new(posting_board::PostingBoard::new(browser.clone(), overrides))
                }
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        "Enabled sources: {}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(sources)
}

/// Flatten extracted records under the source's name.
fn flatten_all(source: &str, records: &[JobRecord]) -> Vec<FlatRow> {
    records
        .iter()
        .map(|record| {
            tracing::debug!("{source}: {}", record.link());
            record.flatten(source)
        })
        .collect()
}

/// Percent-encode a keyword for use in a query string or path segment.
pub fn encode_keyword(keyword: &str) -> String {
    utf8_percent_encode(keyword, ENCODE_URI_COMPONENT_SET).to_string()
}
