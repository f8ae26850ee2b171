use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::browser::{BrowserSession, Renderer};
use super::{BROWSER_USER_AGENT, FetchError};

const ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

/// Flags that strip the most obvious automation fingerprints.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
];

const CONSENT_BUTTON_XPATH: &str = "//button[contains(., 'Accept') or contains(., 'Agree')]";

/// Renderer backed by a local Chrome/Chromium via the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    headless: bool,
}

impl ChromeRenderer {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open(&self, proxy: Option<&str>) -> Result<Box<dyn BrowserSession>, FetchError> {
        let headless = self.headless;
        let proxy_server = proxy.map(|p| format!("http://{p}"));

        let (browser, tab) = blocking(move || {
            let options = LaunchOptions {
                headless,
                sandbox: false,
                window_size: Some((1920, 1080)),
                proxy_server: proxy_server.as_deref(),
                args: LAUNCH_ARGS.iter().map(OsStr::new).collect(),
                idle_browser_timeout: Duration::from_secs(300),
                ..Default::default()
            };
            let browser = Browser::new(options)?;
            let tab = browser.new_tab()?;
            tab.enable_stealth_mode()?;
            tab.set_user_agent(BROWSER_USER_AGENT, Some(ACCEPT_LANGUAGE), Some("Windows"))?;
            tab.set_extra_http_headers(HashMap::from([
                ("Accept-Language", ACCEPT_LANGUAGE),
                ("Referer", "https://www.google.com/"),
            ]))?;
            Ok((browser, tab))
        })
        .await
        .map_err(|e| FetchError::Session(format!("failed to launch browser: {e}")))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };
        // Dropping the browser kills the process and waits on it.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(browser));
            }
            Err(_) => drop(browser),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let tab = self.tab.clone();
        let target = url.to_string();
        blocking(move || {
            tab.navigate_to(&target)?.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        let tab = self.tab.clone();
        blocking(move || tab.get_content())
            .await
            .map_err(|e| FetchError::Session(e.to_string()))
    }

    async fn scroll_height(&mut self) -> Result<f64, FetchError> {
        let tab = self.tab.clone();
        let height = blocking(move || {
            let result = tab.evaluate("document.body.scrollHeight", false)?;
            Ok(result.value.and_then(|v| v.as_f64()).unwrap_or(0.0))
        })
        .await
        .map_err(|e| FetchError::Session(e.to_string()))?;
        Ok(height)
    }

    async fn scroll_to(&mut self, y: f64) -> Result<(), FetchError> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.evaluate(&format!("window.scrollTo(0, {y})"), false)?;
            Ok(())
        })
        .await
        .map_err(|e| FetchError::Session(e.to_string()))
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), FetchError> {
        let tab = self.tab.clone();
        let png = blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
        .map_err(|e| FetchError::Session(e.to_string()))?;
        tokio::fs::write(path, png)
            .await
            .map_err(|e| FetchError::Session(format!("writing {}: {e}", path.display())))
    }

    async fn dismiss_consent(&mut self) {
        let tab = self.tab.clone();
        let clicked = blocking(move || {
            tab.find_element_by_xpath(CONSENT_BUTTON_XPATH)?.click()?;
            Ok(())
        })
        .await;
        match clicked {
            Ok(()) => tracing::info!("Dismissed cookie consent banner"),
            Err(e) => tracing::debug!("No cookie banner dismissed: {e}"),
        }
    }
}

/// Run a blocking DevTools call off the async runtime.
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
