// Page fetching: rendered (browser) and static (HTTP) page sources sharing
// one retry policy, a rotating proxy pool and bot-check detection.

pub mod browser;
pub mod captcha;
pub mod chrome;
pub mod http;
pub mod proxy;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;

pub use browser::BrowserFetcher;
pub use captcha::CaptchaGate;
pub use http::HttpFetcher;
pub use proxy::ProxyPool;
pub use retry::RetryPolicy;

/// Markers that indicate a bot check instead of real content.
pub const DEFAULT_BOT_MARKERS: &[&str] = &["captcha", "robot", "cloudflare"];

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Bot check detected: {0}")]
    Blocked(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("All {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl FetchError {
    /// Bot checks are retried with the proxy setting flipped.
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Blocked(_))
    }
}

/// Per-request knobs for a fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Incremental scrolls performed to trigger lazy-loaded content.
    pub scroll_count: u32,
    /// Pause after each scroll.
    pub scroll_delay: Duration,
    /// Additional attempts after the first failure.
    pub retry_count: u32,
    pub use_proxy: bool,
    /// Wait for an operator to solve a detected CAPTCHA instead of giving up.
    pub manual_captcha: bool,
    /// Lower-case substrings that identify a bot-check page.
    pub bot_markers: Vec<String>,
    /// Substring the finished page must contain; a miss is retried while attempts remain.
    pub ready_marker: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            scroll_count: 0,
            scroll_delay: Duration::from_secs(1),
            retry_count: 2,
            use_proxy: false,
            manual_captcha: false,
            bot_markers: DEFAULT_BOT_MARKERS.iter().map(|m| m.to_string()).collect(),
            ready_marker: None,
        }
    }
}

impl FetchOptions {
    pub fn with_proxy(&self, use_proxy: bool) -> Self {
        Self {
            use_proxy,
            ..self.clone()
        }
    }
}

/// Something that turns a URL into page content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError>;
}

/// Case-insensitive scan for bot-check markers; returns the first hit.
pub fn detect_bot_check<'m>(content: &str, markers: &'m [String]) -> Option<&'m str> {
    let lowered = content.to_lowercase();
    markers
        .iter()
        .find(|marker| lowered.contains(&marker.to_lowercase()))
        .map(String::as_str)
}
