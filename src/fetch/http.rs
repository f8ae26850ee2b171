use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use super::retry::{Attempt, RetryPolicy};
use super::{BROWSER_USER_AGENT, FetchError, FetchOptions, PageFetcher, ProxyPool, detect_bot_check};

/// Plain HTTP page source for boards that serve listings without scripts.
pub struct HttpFetcher {
    client: Client,
    proxies: Arc<ProxyPool>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(proxies: Arc<ProxyPool>) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(None)?,
            proxies,
            retry: RetryPolicy::new(0),
        })
    }

    /// Override the retry delays; the attempt bound always comes from the fetch options.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn client_for(&self, use_proxy: bool) -> Result<Client, FetchError> {
        if !use_proxy {
            return Ok(self.client.clone());
        }
        match self.proxies.next() {
            Some(proxy) => {
                tracing::info!("Using proxy server {proxy}");
                build_client(Some(&proxy))
            }
            None => Ok(self.client.clone()),
        }
    }

    async fn attempt(
        &self,
        url: &str,
        options: &FetchOptions,
        attempt: Attempt,
    ) -> Result<String, FetchError> {
        let client = self.client_for(attempt.use_proxy)?;
        let resp = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(REQUEST_TIMEOUT)
            } else {
                FetchError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if matches!(status.as_u16(), 403 | 429 | 503) {
            return Err(FetchError::Blocked(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await.map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            reason: format!("reading body: {e}"),
        })?;
        if let Some(marker) = detect_bot_check(&body, &options.bot_markers) {
            return Err(FetchError::Blocked(marker.to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        tracing::info!("Requesting {url}");
        let policy = RetryPolicy {
            max_retries: options.retry_count,
            ..self.retry.clone()
        };
        policy
            .run(options.use_proxy, |attempt| self.attempt(url, options, attempt))
            .await
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client(proxy: Option<&str>) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let mut builder = Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT);
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(format!("http://{proxy}"))
            .map_err(|e| FetchError::Client(format!("invalid proxy {proxy}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            cooldown: Duration::ZERO,
            blocked_base: Duration::ZERO,
            blocked_step: Duration::ZERO,
        }
    }

    /// Serves 429 for the first `throttled` requests, then a listing page.
    async fn serve(throttled: usize) -> String {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/jobs",
            get(move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < throttled {
                        (StatusCode::TOO_MANY_REQUESTS, "slow down".to_string())
                    } else {
                        (StatusCode::OK, "<html>listings</html>".to_string())
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/jobs")
    }

    #[tokio::test]
    async fn throttled_requests_are_retried() {
        let url = serve(2).await;
        let fetcher = HttpFetcher::new(Arc::new(ProxyPool::default()))
            .unwrap()
            .with_retry_policy(no_delay());

        let body = fetcher.fetch(&url, &FetchOptions::default()).await.unwrap();
        assert_eq!(body, "<html>listings</html>");
    }

    #[tokio::test]
    async fn gives_up_after_retry_bound() {
        let url = serve(10).await;
        let fetcher = HttpFetcher::new(Arc::new(ProxyPool::default()))
            .unwrap()
            .with_retry_policy(no_delay());
        let options = FetchOptions {
            retry_count: 1,
            ..Default::default()
        };

        let result = fetcher.fetch(&url, &options).await;
        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 2, .. })));
    }
}
