//! Direct document download for sources that already publish a PDF.
//!
//! No browser involved. Requests carry browser-like headers because some bank
//! CDNs reject obvious bots, and go through the same linear backoff as
//! navigation.

use std::time::Duration;

use anyhow::{anyhow, bail};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::warn;

use crate::navigator::{with_backoff, RetryPolicy};
use crate::types::{SnapshotError, SnapshotResult};

pub const DEFAULT_DOWNLOAD_TIMEOUT_MS: u64 = 90_000;

const ACCEPT_DOCUMENT: &str =
    "application/pdf, text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// HTTP fetcher for `download` sources.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(user_agent: &str, timeout_ms: u64, policy: RetryPolicy) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_DOCUMENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default HTTP client: {e}");
                reqwest::Client::default()
            });

        Self { client, policy }
    }

    /// GET `url`, retrying transport errors and non-success statuses.
    pub async fn fetch(&self, url: &str) -> SnapshotResult<Vec<u8>> {
        let client = &self.client;
        let label = format!("GET {url}");

        with_backoff(&self.policy, &label, move |_| async move {
            let resp = client
                .get(url)
                .send()
                .await
                .map_err(|e| anyhow!("request failed: {e}"))?;
            let status = resp.status();
            if !status.is_success() {
                bail!("bad status: {status}");
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| anyhow!("failed to read body: {e}"))?;
            Ok(body.to_vec())
        })
        .await
        .map_err(|exhausted| SnapshotError::Download {
            url: url.to_string(),
            source: exhausted.last.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
            attempt_timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates.pdf"))
            .and(header("accept-language", ACCEPT_LANGUAGE_VALUE))
            .and(header("user-agent", "ratesnap-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 hdfc".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dl = Downloader::new("ratesnap-test", 5_000, fast_policy());
        let body = dl
            .fetch(&format!("{}/rates.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"%PDF-1.4 hdfc");
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dl = Downloader::new("ua", 5_000, fast_policy());
        let body = dl.fetch(&server.uri()).await.unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let dl = Downloader::new("ua", 5_000, fast_policy());
        let err = dl.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Download { .. }));
        assert!(err.to_string().contains("404"));
        assert!(!err.is_fatal());
    }
}
