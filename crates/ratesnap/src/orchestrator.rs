//! Session orchestration for a capture run.
//!
//! One browser session and one page are shared sequentially by every rendered
//! source; download-only runs never start a browser. A failing source is
//! recorded and the loop moves on; only session-level and shared-folder
//! failures end the run. The session is closed exactly once on every path
//! after a successful launch.

use std::path::Path;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::browser::{BrowserLauncher, BrowserSession, LaunchOptions, PageContext};
use crate::bucket;
use crate::config::SnapshotConfig;
use crate::download::Downloader;
use crate::navigator::navigate;
use crate::readiness::{Readiness, SelectorReady, SettleDelay};
use crate::renderer::render;
use crate::storage::{self, DOCUMENT_EXT};
use crate::types::{
    CaptureResult, CaptureState, RunReport, Source, SourceKind, SnapshotError, SnapshotResult,
};

/// Runs the capture batch described by a [`SnapshotConfig`].
pub struct Orchestrator {
    config: SnapshotConfig,
    launcher: Box<dyn BrowserLauncher>,
    readiness: Box<dyn Readiness>,
    downloader: Downloader,
}

impl Orchestrator {
    /// Create an orchestrator that settles pages with the configured delay.
    pub fn new(config: SnapshotConfig, launcher: impl BrowserLauncher + 'static) -> Self {
        let readiness = Box::new(SettleDelay(config.settle_delay()));
        let downloader = Downloader::new(
            &config.user_agent,
            config.download_timeout_ms,
            config.retry,
        );
        Self {
            config,
            launcher: Box::new(launcher),
            readiness,
            downloader,
        }
    }

    /// Replace the default settle delay for sources without a ready selector.
    pub fn with_readiness(mut self, readiness: impl Readiness + 'static) -> Self {
        self.readiness = Box::new(readiness);
        self
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            executable: self.config.chromium_path.clone(),
            headless: self.config.headless,
            args: self.config.browser_args.clone(),
        }
    }

    /// Whether any source has to be printed by the browser.
    pub fn needs_browser(&self) -> bool {
        self.config.needs_browser()
    }

    /// Capture every configured source for the bucket containing `now`.
    ///
    /// The browser is only launched when a source needs rendering.
    pub async fn run_all(&self, now: DateTime<Utc>) -> SnapshotResult<RunReport> {
        let tz = self.config.timezone()?;

        if !self.needs_browser() {
            debug!("no rendered sources, skipping browser launch");
            return self.run_sources(None, now, &tz).await;
        }

        let mut session = self
            .launcher
            .launch(&self.launch_options())
            .await
            .map_err(|e| SnapshotError::Session(format!("launch failed: {e:#}")))?;
        debug!("browser session started");

        let outcome = self.run_sources(Some(session.as_mut()), now, &tz).await;
        let closed = session.close().await;
        debug!("browser session closed");

        match (outcome, closed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(SnapshotError::Session(format!("close failed: {e:#}"))),
            (Err(run_err), Ok(())) => Err(run_err),
            (Err(run_err), Err(close_err)) => {
                warn!("browser close also failed: {close_err:#}");
                Err(run_err)
            }
        }
    }

    async fn run_sources(
        &self,
        session: Option<&mut dyn BrowserSession>,
        now: DateTime<Utc>,
        tz: &FixedOffset,
    ) -> SnapshotResult<RunReport> {
        let bucket = bucket::resolve(now, tz);
        let folder = storage::ensure_folder(&self.config.base_dir, &bucket)?;
        info!("Snapshot folder: {}", folder.display());

        let mut page = match session {
            Some(session) => Some(
                session
                    .new_page(Some(&self.config.user_agent))
                    .await
                    .map_err(|e| SnapshotError::Session(format!("failed to open page: {e:#}")))?,
            ),
            None => None,
        };

        let mut results = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            let span = info_span!("source", name = %source.name);
            let result = match (source.kind, page.as_deref_mut()) {
                (SourceKind::Render, Some(page)) => {
                    self.capture_rendered(page, source, &folder)
                        .instrument(span)
                        .await
                }
                (SourceKind::Render, None) => failed(
                    source,
                    &SnapshotError::Session("no browser session".into()),
                ),
                (SourceKind::Download, _) => {
                    capture_download(&self.downloader, source, &folder)
                        .instrument(span)
                        .await
                }
            };
            results.push(result);
        }

        if self.config.write_manifest {
            let run_at = now
                .with_timezone(tz)
                .to_rfc3339_opts(SecondsFormat::Secs, false);
            if let Err(e) = storage::write_manifest(&folder, &run_at, &results) {
                warn!("failed to write manifest: {e}");
            }
        }

        Ok(RunReport {
            bucket,
            folder,
            results,
        })
    }

    /// Navigate, settle and print one source. Never propagates.
    async fn capture_rendered(
        &self,
        page: &mut dyn PageContext,
        source: &Source,
        folder: &Path,
    ) -> CaptureResult {
        let mut state = CaptureState::Pending;
        info!("Printing {} -> PDF", source.name);

        advance(&mut state, CaptureState::Navigating);
        let navigated = match navigate(page, &source.url, &self.config.retry).await {
            Ok(_) => self.wait_ready(page, source).await,
            Err(e) => Err(e),
        };
        if let Err(e) = navigated {
            advance(&mut state, CaptureState::NavigationFailed);
            return failed(source, &e);
        }
        advance(&mut state, CaptureState::Navigated);

        let out = storage::output_path_for(folder, source, DOCUMENT_EXT);
        match render(page, &out, &self.config.render).await {
            Ok(bytes) => {
                advance(&mut state, CaptureState::Rendered);
                info!(bytes, "Saved {}", out.display());
                CaptureResult::Saved {
                    source: source.name.clone(),
                    path: out,
                }
            }
            Err(e) => {
                advance(&mut state, CaptureState::RenderFailed);
                failed(source, &e)
            }
        }
    }

    async fn wait_ready(&self, page: &mut dyn PageContext, source: &Source) -> SnapshotResult<()> {
        match &source.ready_selector {
            Some(selector) => {
                SelectorReady::new(selector.clone(), self.config.selector_timeout())
                    .wait_ready(page)
                    .await
            }
            None => self.readiness.wait_ready(page).await,
        }
    }
}

/// Fetch a published document directly. The fetch stands in for navigation
/// and the file write for rendering.
async fn capture_download(dl: &Downloader, source: &Source, folder: &Path) -> CaptureResult {
    let mut state = CaptureState::Pending;
    info!("Downloading {}", source.name);

    advance(&mut state, CaptureState::Navigating);
    let bytes = match dl.fetch(&source.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            advance(&mut state, CaptureState::NavigationFailed);
            return failed(source, &e);
        }
    };
    advance(&mut state, CaptureState::Navigated);

    let out = storage::output_path_for(folder, source, DOCUMENT_EXT);
    if let Err(e) = tokio::fs::write(&out, &bytes).await {
        advance(&mut state, CaptureState::RenderFailed);
        let err = SnapshotError::Download {
            url: source.url.clone(),
            source: Box::new(e),
        };
        return failed(source, &err);
    }
    advance(&mut state, CaptureState::Rendered);
    info!(
        "Saved {}  ({} KB)",
        out.display(),
        (bytes.len() / 1024).max(1)
    );
    CaptureResult::Saved {
        source: source.name.clone(),
        path: out,
    }
}

fn advance(state: &mut CaptureState, next: CaptureState) {
    debug_assert!(
        !state.is_terminal(),
        "capture already finished as {}",
        state.as_str()
    );
    debug!(from = state.as_str(), to = next.as_str(), "capture state");
    *state = next;
}

fn failed(source: &Source, err: &SnapshotError) -> CaptureResult {
    error!("FAILED to print {}: {err}", source.name);
    CaptureResult::Failed {
        source: source.name.clone(),
        reason: err.to_string(),
    }
}
