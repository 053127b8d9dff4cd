//! Deciding when a navigated page is ready to capture.
//!
//! Rate tables are often populated client-side after the network goes quiet.
//! A fixed settle delay covers most sites; a selector check is the stronger
//! option when a page has a stable marker element.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::PageContext;
use crate::types::{SnapshotError, SnapshotResult};

pub const DEFAULT_SETTLE_MS: u64 = 2_000;
pub const DEFAULT_SELECTOR_TIMEOUT_MS: u64 = 15_000;
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// A post-navigation wait.
#[async_trait]
pub trait Readiness: Send + Sync {
    async fn wait_ready(&self, page: &mut dyn PageContext) -> SnapshotResult<()>;
}

/// Capture straight away.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

#[async_trait]
impl Readiness for Immediate {
    async fn wait_ready(&self, _page: &mut dyn PageContext) -> SnapshotResult<()> {
        Ok(())
    }
}

/// Sleep for a fixed duration. Best effort only.
#[derive(Debug, Clone, Copy)]
pub struct SettleDelay(pub Duration);

impl Default for SettleDelay {
    fn default() -> Self {
        Self(Duration::from_millis(DEFAULT_SETTLE_MS))
    }
}

#[async_trait]
impl Readiness for SettleDelay {
    async fn wait_ready(&self, _page: &mut dyn PageContext) -> SnapshotResult<()> {
        if !self.0.is_zero() {
            debug!(settle_ms = self.0.as_millis() as u64, "settling");
            tokio::time::sleep(self.0).await;
        }
        Ok(())
    }
}

/// Poll until `selector` matches an element.
#[derive(Debug, Clone)]
pub struct SelectorReady {
    pub selector: String,
    pub timeout: Duration,
}

impl SelectorReady {
    pub fn new(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
        }
    }

    fn probe_script(&self) -> String {
        // JSON string literals are valid JS string literals.
        let quoted = serde_json::to_string(&self.selector).unwrap_or_else(|_| "\"\"".into());
        format!("document.querySelector({quoted}) !== null")
    }
}

#[async_trait]
impl Readiness for SelectorReady {
    async fn wait_ready(&self, page: &mut dyn PageContext) -> SnapshotResult<()> {
        let script = self.probe_script();
        let start = tokio::time::Instant::now();

        loop {
            match page.evaluate(&script).await {
                Ok(serde_json::Value::Bool(true)) => {
                    debug!(selector = %self.selector, "selector present");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!(selector = %self.selector, "selector probe failed: {e:#}"),
            }

            if start.elapsed() >= self.timeout {
                return Err(SnapshotError::Readiness {
                    selector: self.selector.clone(),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }
}
