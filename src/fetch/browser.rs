use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::captcha::{CaptchaGate, CaptchaResolution};
use super::retry::{Attempt, RetryPolicy};
use super::{FetchError, FetchOptions, PageFetcher, ProxyPool, detect_bot_check};

/// Sub-steps per scroll, each followed by a short irregular pause.
const SCROLL_STEPS: u32 = 10;
const SETTLE_AFTER_NAVIGATION: Duration = Duration::from_secs(2);
const FINAL_SETTLE: Duration = Duration::from_secs(3);

/// One exclusive browser instance with a single page.
///
/// Dropping the session must release the browser.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;
    async fn content(&mut self) -> Result<String, FetchError>;
    async fn scroll_height(&mut self) -> Result<f64, FetchError>;
    async fn scroll_to(&mut self, y: f64) -> Result<(), FetchError>;
    async fn screenshot(&mut self, path: &Path) -> Result<(), FetchError>;

    /// Click away a cookie banner if one is showing. Failures are ignored.
    async fn dismiss_consent(&mut self) {}
}

/// Launches fresh browser sessions, optionally routed through a proxy.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self, proxy: Option<&str>) -> Result<Box<dyn BrowserSession>, FetchError>;
}

/// Fetches fully rendered pages, retrying bot checks and crashes with a
/// fresh session each time.
pub struct BrowserFetcher {
    renderer: Arc<dyn Renderer>,
    proxies: Arc<ProxyPool>,
    captcha: CaptchaGate,
    artifacts_dir: PathBuf,
    navigation_timeout: Duration,
    retry: RetryPolicy,
}

impl BrowserFetcher {
    pub fn new(renderer: Arc<dyn Renderer>, proxies: Arc<ProxyPool>, captcha: CaptchaGate) -> Self {
        Self {
            renderer,
            proxies,
            captcha,
            artifacts_dir: PathBuf::from("."),
            navigation_timeout: Duration::from_secs(60),
            retry: RetryPolicy::new(0),
        }
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Override the retry delays; the attempt bound always comes from the fetch options.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn attempt(
        &self,
        url: &str,
        options: &FetchOptions,
        attempt: Attempt,
    ) -> Result<String, FetchError> {
        let proxy = if attempt.use_proxy {
            self.proxies.next()
        } else {
            None
        };
        if let Some(proxy) = &proxy {
            tracing::info!("Using proxy server {proxy}");
        }

        let mut session = self.renderer.open(proxy.as_deref()).await?;
        // The session is dropped (and the browser torn down) on every return path.
        self.drive(session.as_mut(), url, options, attempt).await
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        options: &FetchOptions,
        attempt: Attempt,
    ) -> Result<String, FetchError> {
        tracing::info!("Loading {url} (attempt {}/{})", attempt.index + 1, attempt.total);
        match tokio::time::timeout(self.navigation_timeout, session.navigate(url)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.navigation_timeout)),
        }
        session.dismiss_consent().await;
        tokio::time::sleep(SETTLE_AFTER_NAVIGATION + jitter(SETTLE_AFTER_NAVIGATION)).await;

        let content = session.content().await?;
        if let Some(marker) = detect_bot_check(&content, &options.bot_markers) {
            tracing::warn!(
                "Bot check '{marker}' detected on {url} (attempt {}/{})",
                attempt.index + 1,
                attempt.total
            );
            let screenshot = self.capture(session, attempt.index).await;

            if !options.manual_captcha {
                return Err(FetchError::Blocked(marker.to_string()));
            }
            match self
                .captcha
                .wait_for_operator(url, attempt.index, screenshot)
                .await
            {
                CaptchaResolution::Cancelled => {
                    return Err(FetchError::Blocked(format!("{marker} (unresolved)")));
                }
                CaptchaResolution::Resolved => {
                    let content = session.content().await?;
                    if let Some(marker) = detect_bot_check(&content, &options.bot_markers) {
                        tracing::warn!("Bot check still present after manual resolution");
                        return Err(FetchError::Blocked(marker.to_string()));
                    }
                    tracing::info!("CAPTCHA resolved by operator");
                }
            }
        }

        scroll(session, options).await?;
        tokio::time::sleep(FINAL_SETTLE).await;

        let content = session.content().await?;
        if let Some(ready) = &options.ready_marker
            && !content.contains(ready.as_str())
        {
            if !attempt.is_last() {
                return Err(FetchError::Blocked(format!("'{ready}' missing from page")));
            }
            tracing::warn!("'{ready}' missing from {url}, returning page as is");
        }
        Ok(content)
    }

    /// Save a diagnostic screenshot; returns the intended path even on failure.
    async fn capture(&self, session: &mut dyn BrowserSession, attempt: u32) -> PathBuf {
        let path = self
            .artifacts_dir
            .join(format!("captcha_detected_{attempt}.png"));
        match session.screenshot(&path).await {
            Ok(()) => tracing::info!("Saved bot-check screenshot to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save screenshot {}: {e}", path.display()),
        }
        path
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let policy = RetryPolicy {
            max_retries: options.retry_count,
            ..self.retry.clone()
        };
        policy
            .run(options.use_proxy, |attempt| self.attempt(url, options, attempt))
            .await
    }
}

/// Scroll down in `scroll_count` rounds, each to a larger fraction of the page.
async fn scroll(
    session: &mut dyn BrowserSession,
    options: &FetchOptions,
) -> Result<(), FetchError> {
    for round in 0..options.scroll_count {
        tracing::debug!("Scrolling {}/{}", round + 1, options.scroll_count);
        let height = session.scroll_height().await?;
        let target = height * f64::from(round + 1) / f64::from(options.scroll_count);

        for step in 1..=SCROLL_STEPS {
            session
                .scroll_to(target * f64::from(step) / f64::from(SCROLL_STEPS))
                .await?;
            let pause = Duration::from_millis(100);
            tokio::time::sleep(pause + jitter(pause * 2)).await;
        }

        // 0.8x to 1.2x of the configured delay.
        let base = options.scroll_delay.mul_f64(0.8);
        tokio::time::sleep(base + jitter(options.scroll_delay.mul_f64(0.4))).await;
    }
    Ok(())
}

fn jitter(max: Duration) -> Duration {
    max.mul_f64(rand::rng().random::<f64>())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// What one fake session does when asked for content.
    #[derive(Debug, Clone)]
    pub enum Script {
        NavigationFails,
        Serves(Vec<String>),
    }

    /// Renderer that plays back one script per opened session.
    #[derive(Default)]
    pub struct FakeRenderer {
        scripts: Mutex<VecDeque<Script>>,
        pub opened: AtomicUsize,
        pub closed: Arc<AtomicUsize>,
        pub proxies: Mutex<Vec<Option<String>>>,
        pub scrolls: Arc<AtomicUsize>,
        pub screenshots: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl FakeRenderer {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn open(&self, proxy: Option<&str>) -> Result<Box<dyn BrowserSession>, FetchError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.proxies.lock().unwrap().push(proxy.map(String::from));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::NavigationFails);
            Ok(Box::new(FakeSession {
                script,
                closed: self.closed.clone(),
                scrolls: self.scrolls.clone(),
                screenshots: self.screenshots.clone(),
            }))
        }
    }

    struct FakeSession {
        script: Script,
        closed: Arc<AtomicUsize>,
        scrolls: Arc<AtomicUsize>,
        screenshots: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
            match self.script {
                Script::NavigationFails => Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".into(),
                }),
                Script::Serves(_) => Ok(()),
            }
        }

        async fn content(&mut self) -> Result<String, FetchError> {
            match &mut self.script {
                Script::Serves(pages) if pages.len() > 1 => Ok(pages.remove(0)),
                Script::Serves(pages) => Ok(pages.first().cloned().unwrap_or_default()),
                Script::NavigationFails => Err(FetchError::Session("no page".into())),
            }
        }

        async fn scroll_height(&mut self) -> Result<f64, FetchError> {
            Ok(4000.0)
        }

        async fn scroll_to(&mut self, _y: f64) -> Result<(), FetchError> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn screenshot(&mut self, path: &Path) -> Result<(), FetchError> {
            self.screenshots.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn fetcher(renderer: Arc<FakeRenderer>, proxies: Vec<String>, gate: CaptchaGate) -> BrowserFetcher {
        BrowserFetcher::new(renderer, Arc::new(ProxyPool::new(proxies)), gate)
            .with_artifacts_dir("/tmp/artifacts")
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_fresh_sessions_until_success() {
        let renderer = Arc::new(FakeRenderer::new(vec![
            Script::NavigationFails,
            Script::NavigationFails,
            Script::Serves(vec!["<html>jobs</html>".into()]),
        ]));
        let fetcher = fetcher(renderer.clone(), vec![], CaptchaGate::disabled());

        let page = fetcher
            .fetch("https://remoteok.com/remote-rust-jobs", &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(page, "<html>jobs</html>");
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 3);
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_page_fails_instead_of_returning_content() {
        let captcha = "<html>Please complete the captcha</html>".to_string();
        let renderer = Arc::new(FakeRenderer::new(vec![
            Script::Serves(vec![captcha.clone()]),
            Script::Serves(vec![captcha.clone()]),
            Script::Serves(vec![captcha]),
        ]));
        let fetcher = fetcher(renderer.clone(), vec!["10.0.0.1:80".into()], CaptchaGate::disabled());

        let result = fetcher
            .fetch("https://remoteok.com/remote-rust-jobs", &FetchOptions::default())
            .await;

        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 3, .. })));
        // Proxy toggles on, then off again.
        assert_eq!(
            *renderer.proxies.lock().unwrap(),
            vec![None, Some("10.0.0.1:80".to_string()), None]
        );
        assert_eq!(
            *renderer.screenshots.lock().unwrap(),
            vec![
                PathBuf::from("/tmp/artifacts/captcha_detected_0.png"),
                PathBuf::from("/tmp/artifacts/captcha_detected_1.png"),
                PathBuf::from("/tmp/artifacts/captcha_detected_2.png"),
            ]
        );
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_resolution_continues_same_session() {
        let renderer = Arc::new(FakeRenderer::new(vec![Script::Serves(vec![
            "<html>robot check</html>".into(),
            "<html>listings</html>".into(),
        ])]));
        let (gate, mut prompts) = CaptchaGate::channel(Duration::from_secs(60));
        tokio::spawn(async move {
            while let Some(prompt) = prompts.recv().await {
                prompt.resolve(CaptchaResolution::Resolved);
            }
        });
        let fetcher = fetcher(renderer.clone(), vec![], gate);
        let options = FetchOptions {
            manual_captcha: true,
            scroll_count: 2,
            ..Default::default()
        };

        let page = fetcher.fetch("https://x.test", &options).await.unwrap();

        assert_eq!(page, "<html>listings</html>");
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.scrolls.load(Ordering::SeqCst), 2 * SCROLL_STEPS as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ready_marker_is_retried_then_accepted() {
        let renderer = Arc::new(FakeRenderer::new(vec![
            Script::Serves(vec!["<html>empty</html>".into()]),
            Script::Serves(vec!["<html>still empty</html>".into()]),
        ]));
        let fetcher = fetcher(renderer.clone(), vec![], CaptchaGate::disabled());
        let options = FetchOptions {
            retry_count: 1,
            ready_marker: Some("jobsboard".into()),
            ..Default::default()
        };

        let page = fetcher.fetch("https://x.test", &options).await.unwrap();

        assert_eq!(page, "<html>still empty</html>");
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
    }
}
