//! Chromium-based browser using chromiumoxide.

use super::{
    BrowserLauncher, BrowserSession, LaunchOptions, MediaType, NavigationResult, PageContext,
    PdfOptions,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, PrintToPdfParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Env var naming an explicit browser binary.
pub const CHROMIUM_PATH_ENV: &str = "RATESNAP_CHROMIUM_PATH";

/// No new resource entries for this long counts as network quiescence.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Resource timing entries stop accumulating once the buffer is full (250 by
/// default), which would freeze the count below. Installed before any page
/// script runs so heavy pages keep reporting new requests.
const RESOURCE_BUFFER_SETUP: &str = "performance.setResourceTimingBufferSize(100000);";

const RESOURCE_PROBE: &str = "JSON.stringify({ \
    ready: document.readyState, \
    resources: performance.getEntriesByType('resource').length \
})";

/// Find the Chromium binary path.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    // 1. RATESNAP_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Configured path
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 3. ~/.ratesnap/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".ratesnap/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".ratesnap/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".ratesnap/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".ratesnap/chromium/chrome-linux64/chrome"),
                home.join(".ratesnap/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches headless Chromium processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        let chrome_path = find_chromium(options.executable.as_deref()).context(
            "Chromium not found. Set RATESNAP_CHROMIUM_PATH or install google-chrome/chromium.",
        )?;
        debug!(path = %chrome_path.display(), "launching chromium");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        for arg in &options.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // CDP messages only flow while the handler is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromium handler: {e}");
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
        }))
    }
}

/// A launched Chromium process.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self, user_agent: Option<&str>) -> Result<Box<dyn PageContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            RESOURCE_BUFFER_SETUP,
        ))
        .await
        .context("failed to install resource timing setup")?;

        if let Some(ua) = user_agent {
            page.set_user_agent(SetUserAgentOverrideParams::new(ua.to_string()))
                .await
                .context("failed to override user agent")?;
        }

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self {
            mut browser,
            handler_task,
        } = *self;
        let closed = browser.close().await.context("failed to close Chromium");
        if let Err(e) = browser.wait().await {
            warn!("waiting for chromium exit: {e}");
        }
        handler_task.abort();
        closed.map(|_| ())
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Poll until the load event fired and no new resource entries appeared
    /// during [`QUIET_WINDOW`].
    ///
    /// Long-lived connections (websockets, streaming fetches) do not add
    /// entries, so a page that only holds those open counts as quiet.
    async fn wait_for_network_idle(&self) -> Result<()> {
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let raw: String = self
                .page
                .evaluate(RESOURCE_PROBE)
                .await
                .context("failed to probe network activity")?
                .into_value()
                .map_err(|e| anyhow!("failed to decode network probe: {e:?}"))?;
            let probe: serde_json::Value = serde_json::from_str(&raw)?;
            let ready = probe["ready"].as_str() == Some("complete");
            let count = probe["resources"].as_u64().unwrap_or(0);

            if last_count != Some(count) || !ready {
                last_count = Some(count);
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= QUIET_WINDOW {
                return Ok(());
            }

            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

#[async_trait]
impl PageContext for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            self.page.goto(url).await.context("navigation failed")?;
            self.wait_for_network_idle().await
        })
        .await;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow!("navigation timed out after {timeout_ms}ms")),
        }
    }

    async fn emulate_media(&mut self, media: MediaType) -> Result<()> {
        let params = SetEmulatedMediaParams {
            media: Some(media.as_str().to_string()),
            ..Default::default()
        };
        self.page
            .execute(params)
            .await
            .context("failed to emulate media type")?;
        Ok(())
    }

    async fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        let (width, height) = options.format.size_inches();
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(width),
            paper_height: Some(height),
            ..Default::default()
        };
        self.page.pdf(params).await.context("failed to print page")
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, b"").unwrap();
        if std::env::var(CHROMIUM_PATH_ENV).is_err() {
            assert_eq!(find_chromium(Some(&fake)), Some(fake));
        }
    }

    #[test]
    fn test_resource_buffer_raised_past_default() {
        let size: u32 = RESOURCE_BUFFER_SETUP
            .trim_start_matches("performance.setResourceTimingBufferSize(")
            .trim_end_matches(");")
            .parse()
            .unwrap();
        assert!(size > 250);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_counts_resources_past_default_buffer() {
        use wiremock::matchers::{method, path, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let imgs: String = (0..300)
            .map(|i| format!("<img src=\"/px/{i}.gif\">"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(format!("<html><body>{imgs}</body></html>")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/px/\d+\.gif$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a".to_vec()))
            .mount(&server)
            .await;

        let mut session = ChromiumLauncher
            .launch(&LaunchOptions {
                headless: true,
                ..Default::default()
            })
            .await
            .expect("failed to launch");
        let mut page = session.new_page(None).await.expect("failed to create page");
        page.goto(&format!("{}/rates", server.uri()), 30_000)
            .await
            .expect("navigation failed");

        let count = page
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .expect("JS execution failed");
        assert!(count.as_u64().unwrap() >= 300);

        session.close().await.expect("close failed");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_print() {
        let mut session = ChromiumLauncher
            .launch(&LaunchOptions {
                headless: true,
                ..Default::default()
            })
            .await
            .expect("failed to launch");
        let mut page = session
            .new_page(Some("ratesnap-test"))
            .await
            .expect("failed to create page");

        let nav = page
            .goto("data:text/html,<table><tr><td>USD</td><td>83.1</td></tr></table>", 10000)
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10000);

        let ua = page
            .evaluate("navigator.userAgent")
            .await
            .expect("JS execution failed");
        assert_eq!(ua.as_str().unwrap(), "ratesnap-test");

        page.emulate_media(MediaType::Print)
            .await
            .expect("media emulation failed");
        let pdf = page
            .print_to_pdf(&PdfOptions::default())
            .await
            .expect("print failed");
        assert!(pdf.starts_with(b"%PDF"));

        session.close().await.expect("close failed");
    }
}
