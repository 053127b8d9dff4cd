//! Core data types for snapshot runs and the error taxonomy.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bucket::TimeBucket;

/// How a source's document is acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Navigate the browser to the page and print it.
    #[default]
    Render,
    /// The URL already serves a document; fetch its bytes directly.
    Download,
}

/// A statically configured page to snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Identifier, unique within a run. Used as the output file stem.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// CSS selector that must exist before the page is captured.
    /// Falls back to the configured settle delay when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_selector: Option<String>,
}

impl Source {
    /// A rendered source with no readiness selector.
    pub fn render(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: SourceKind::Render,
            ready_selector: None,
        }
    }

    /// A source fetched directly over HTTP.
    pub fn download(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: SourceKind::Download,
            ready_selector: None,
        }
    }

    pub fn with_ready_selector(mut self, selector: impl Into<String>) -> Self {
        self.ready_selector = Some(selector.into());
        self
    }
}

/// Per-source progress through a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Pending,
    Navigating,
    Navigated,
    NavigationFailed,
    Rendered,
    RenderFailed,
}

impl CaptureState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Navigating => "navigating",
            Self::Navigated => "navigated",
            Self::NavigationFailed => "navigation_failed",
            Self::Rendered => "rendered",
            Self::RenderFailed => "render_failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NavigationFailed | Self::Rendered | Self::RenderFailed
        )
    }
}

/// Outcome of one source within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureResult {
    Saved { source: String, path: PathBuf },
    Failed { source: String, reason: String },
}

impl CaptureResult {
    pub fn source(&self) -> &str {
        match self {
            Self::Saved { source, .. } | Self::Failed { source, .. } => source,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Saved { path, .. } => Some(path),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub bucket: TimeBucket,
    pub folder: PathBuf,
    /// Results in source declaration order.
    pub results: Vec<CaptureResult>,
}

impl RunReport {
    pub fn saved(&self) -> usize {
        self.results.iter().filter(|r| r.is_saved()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.saved()
    }
}

/// Boxed underlying cause carried by [`SnapshotError`] variants.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the snapshot pipeline.
///
/// `Navigation`, `Readiness`, `Render` and `Download` are scoped to a single
/// source. `Io`, `Session` and `Config` abort the run.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("navigation to {url} failed after {attempts} attempt(s): {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: Cause,
    },

    #[error("page not ready: selector `{selector}` missing after {waited_ms}ms")]
    Readiness { selector: String, waited_ms: u64 },

    #[error("render to {} failed: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: Cause,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("browser session error: {0}")]
    Session(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SnapshotError {
    /// Whether this error ends the whole run rather than a single source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Session(_) | Self::Config(_))
    }
}

/// Convenience result type.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
