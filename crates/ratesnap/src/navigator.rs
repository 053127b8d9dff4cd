//! Navigation with bounded linear backoff.
//!
//! Third-party rate pages are slow and flaky. Each attempt is bounded by a
//! hard timeout; failed attempts wait `base_backoff_ms * attempt` before the
//! next one. The last failure is surfaced once the ceiling is reached.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::{NavigationResult, PageContext};
use crate::types::{SnapshotError, SnapshotResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 2_000;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 120_000;

/// Retry ceiling and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    /// Hard budget for one navigation attempt.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Outcome of [`with_backoff`] when every attempt failed.
#[derive(Debug)]
pub struct RetriesExhausted {
    pub attempts: u32,
    pub last: anyhow::Error,
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. No delay follows the final
/// attempt.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetriesExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    with_backoff_on(policy, label, (), |(), attempt| {
        let fut = op(attempt);
        async move { ((), fut.await) }
    })
    .await
}

/// [`with_backoff`] for operations that need exclusive access to `state`.
///
/// Each attempt takes `state` by value and hands it back with its outcome, so
/// a `&mut` borrow can be threaded through every retry.
pub async fn with_backoff_on<S, T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut state: S,
    mut op: F,
) -> Result<T, RetriesExhausted>
where
    F: FnMut(S, u32) -> Fut,
    Fut: Future<Output = (S, anyhow::Result<T>)>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let (returned, outcome) = op(state, attempt).await;
        state = returned;
        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("{label} failed (try {attempt}/{max_attempts}): {e:#}");
                if attempt >= max_attempts {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                tokio::time::sleep(policy.backoff_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Navigate `page` to `url`, retrying per `policy`.
///
/// An attempt succeeds once the page reports network quiescence within
/// `policy.attempt_timeout_ms`.
pub async fn navigate(
    page: &mut dyn PageContext,
    url: &str,
    policy: &RetryPolicy,
) -> SnapshotResult<NavigationResult> {
    let label = format!("goto {url}");
    let timeout_ms = policy.attempt_timeout_ms;

    let nav = with_backoff_on(policy, &label, page, |page, _| async move {
        let outcome = page.goto(url, timeout_ms).await;
        (page, outcome)
    })
    .await
    .map_err(|exhausted| SnapshotError::Navigation {
        url: url.to_string(),
        attempts: exhausted.attempts,
        source: exhausted.last.into(),
    })?;

    debug!(
        url,
        final_url = %nav.final_url,
        load_ms = nav.load_time_ms,
        "page quiescent"
    );
    Ok(nav)
}
