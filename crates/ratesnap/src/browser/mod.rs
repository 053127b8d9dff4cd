//! Browser abstraction for page capture.
//!
//! Defines the `BrowserLauncher`, `BrowserSession` and `PageContext` traits
//! that abstract over the browser engine (currently Chromium via
//! chromiumoxide), so the pipeline can be driven by fakes in tests.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for launching a browser process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchOptions {
    /// Explicit browser binary. Discovered when absent.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Extra command-line switches.
    pub args: Vec<String>,
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the network went quiet, in milliseconds.
    pub load_time_ms: u64,
}

/// Stylesheet media type to emulate before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Print,
    Screen,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Screen => "screen",
        }
    }
}

/// Paper geometry for printed documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperFormat {
    #[default]
    A4,
    Letter,
}

impl PaperFormat {
    /// Width and height in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            Self::A4 => (8.27, 11.69),
            Self::Letter => (8.5, 11.0),
        }
    }
}

/// Print parameters passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfOptions {
    pub format: PaperFormat,
    pub print_background: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            print_background: true,
        }
    }
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserSession: Send {
    /// Open a page, applying a user-agent override if given.
    async fn new_page(&mut self, user_agent: Option<&str>) -> Result<Box<dyn PageContext>>;
    /// Shut the browser down. Consumes the session so it cannot be closed twice.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A single page (tab) used for navigation and printing.
#[async_trait]
pub trait PageContext: Send {
    /// Navigate and wait for network quiescence, bounded by `timeout_ms`.
    async fn goto(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Override the CSS media type. Engines without support return an error.
    async fn emulate_media(&mut self, media: MediaType) -> Result<()>;
    /// Print the current view and return the document bytes.
    async fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>>;
    /// Execute JavaScript in the page context and return the result.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;
}
