//! Run configuration: defaults, file loading and validation.
//!
//! The configuration is an immutable value built once at startup and handed
//! to the orchestrator. Resolution order for the file is explicit path,
//! `RATESNAP_CONFIG`, `./ratesnap.json`, then built-in defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::bucket::parse_utc_offset;
use crate::download::DEFAULT_DOWNLOAD_TIMEOUT_MS;
use crate::navigator::RetryPolicy;
use crate::readiness::{DEFAULT_SELECTOR_TIMEOUT_MS, DEFAULT_SETTLE_MS};
use crate::renderer::RenderOptions;
use crate::types::{Source, SourceKind, SnapshotError, SnapshotResult};

pub const CONFIG_ENV: &str = "RATESNAP_CONFIG";
pub const BASE_DIR_ENV: &str = "RATESNAP_BASE_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "ratesnap.json";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything a run needs, fixed for its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Archive root; buckets are created beneath it.
    pub base_dir: PathBuf,
    /// Civil timezone for bucket labels, as `+HH:MM`.
    pub utc_offset: String,
    /// Processed in declaration order.
    pub sources: Vec<Source>,
    pub retry: RetryPolicy,
    /// Pause after navigation when a source has no ready selector.
    pub settle_ms: u64,
    pub selector_timeout_ms: u64,
    pub render: RenderOptions,
    pub user_agent: String,
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub browser_args: Vec<String>,
    pub download_timeout_ms: u64,
    /// Write `README.txt` into the bucket after each run.
    pub write_manifest: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("data").join("Currency Raw Data"),
            utc_offset: "+05:30".to_string(),
            sources: default_sources(),
            retry: RetryPolicy::default(),
            settle_ms: DEFAULT_SETTLE_MS,
            selector_timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
            render: RenderOptions::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chromium_path: None,
            headless: true,
            browser_args: Vec::new(),
            download_timeout_ms: DEFAULT_DOWNLOAD_TIMEOUT_MS,
            write_manifest: true,
        }
    }
}

/// HDFC publishes its card rates as a ready-made PDF.
pub const HDFC_RATES_URL: &str = "https://www.hdfcbank.com/content/bbp/repositories/\
    723fb80a-2dde-42a3-9793-7ae1be57c87f/?path=/Personal/Home/content/rates.pdf";

/// The bank pages captured when no configuration file is given.
pub fn default_sources() -> Vec<Source> {
    vec![
        Source::download("HDFC_Rates", HDFC_RATES_URL),
        Source::render(
            "AXIS_Rates",
            "https://application.axisbank.co.in/WebForms/corporatecardrate/index.aspx",
        ),
        Source::render(
            "ICICI_Rates",
            "https://www.icicibank.com/corporate/global-markets/forex/forex-card-rate",
        ),
    ]
}

impl SnapshotConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> SnapshotResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| SnapshotError::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve, load, apply env overrides and validate.
    pub fn load(explicit: Option<&Path>) -> SnapshotResult<Self> {
        let mut config = match resolve_config_path(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `RATESNAP_BASE_DIR`.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(BASE_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.base_dir = PathBuf::from(dir);
            }
        }
    }

    /// Target timezone for bucket labels.
    pub fn timezone(&self) -> SnapshotResult<FixedOffset> {
        parse_utc_offset(&self.utc_offset).ok_or_else(|| {
            SnapshotError::Config(format!("invalid utc_offset `{}`", self.utc_offset))
        })
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    /// Whether any source has to be printed by the browser.
    pub fn needs_browser(&self) -> bool {
        self.sources.iter().any(|s| s.kind == SourceKind::Render)
    }

    /// Keep only the named sources, preserving declaration order.
    pub fn retain_sources(&mut self, names: &[String]) -> SnapshotResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.sources.iter().any(|s| &s.name == *n))
        {
            return Err(SnapshotError::Config(format!("unknown source `{unknown}`")));
        }
        self.sources.retain(|s| names.contains(&s.name));
        Ok(())
    }

    /// Reject configurations that would produce colliding or invalid paths.
    pub fn validate(&self) -> SnapshotResult<()> {
        self.timezone()?;

        if self.retry.max_attempts == 0 {
            return Err(SnapshotError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name.trim();
            if name.is_empty() {
                return Err(SnapshotError::Config("source name must not be empty".into()));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(SnapshotError::Config(format!(
                    "source name `{name}` must be a plain file name"
                )));
            }
            if !seen.insert(name) {
                return Err(SnapshotError::Config(format!(
                    "duplicate source name `{name}`"
                )));
            }
            let parsed = url::Url::parse(&source.url).map_err(|e| {
                SnapshotError::Config(format!("source `{name}` has invalid url: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https" | "file" | "data") {
                return Err(SnapshotError::Config(format!(
                    "source `{name}` uses unsupported scheme `{}`",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Locate the configuration file, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::ist;

    #[test]
    fn test_defaults_are_valid() {
        let config = SnapshotConfig::default();
        config.validate().unwrap();
        let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["HDFC_Rates", "AXIS_Rates", "ICICI_Rates"]);
        assert_eq!(config.sources[0].kind, SourceKind::Download);
        assert_eq!(config.sources[1].kind, SourceKind::Render);
        assert!(HDFC_RATES_URL.ends_with("?path=/Personal/Home/content/rates.pdf"));
        assert!(!HDFC_RATES_URL.contains(char::is_whitespace));
        assert_eq!(config.base_dir, PathBuf::from("data/Currency Raw Data"));
        assert_eq!(config.timezone().unwrap(), ist());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.settle_delay(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratesnap.json");
        std::fs::write(
            &path,
            r#"{
                "base_dir": "/srv/rates",
                "sources": [
                    {"name": "HDFC_Rates", "url": "https://example.com/rates.pdf", "kind": "download"}
                ],
                "retry": {"max_attempts": 5}
            }"#,
        )
        .unwrap();

        let config = SnapshotConfig::from_file(&path).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/srv/rates"));
        assert_eq!(config.sources[0].kind, SourceKind::Download);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_backoff_ms, 2_000);
        assert_eq!(config.utc_offset, "+05:30");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = SnapshotConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Config(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = SnapshotConfig {
            sources: vec![
                Source::render("AXIS_Rates", "https://a.example"),
                Source::render("AXIS_Rates", "https://b.example"),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_path_like_names_rejected() {
        let config = SnapshotConfig {
            sources: vec![Source::render("../escape", "https://a.example")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_urls_rejected() {
        for url in ["not a url", "ftp://example.com/rates"] {
            let config = SnapshotConfig {
                sources: vec![Source::render("X", url)],
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_bad_offset_and_zero_attempts_rejected() {
        let config = SnapshotConfig {
            utc_offset: "IST".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = SnapshotConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retain_sources_filters_in_order() {
        let mut config = SnapshotConfig::default();
        config
            .retain_sources(&["ICICI_Rates".to_string(), "HDFC_Rates".to_string()])
            .unwrap();
        let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["HDFC_Rates", "ICICI_Rates"]);

        let mut config = SnapshotConfig::default();
        assert!(config.retain_sources(&["SBI".to_string()]).is_err());
    }

    #[test]
    fn test_needs_browser_only_for_rendered_sources() {
        assert!(SnapshotConfig::default().needs_browser());

        let mut config = SnapshotConfig::default();
        config.retain_sources(&["HDFC_Rates".to_string()]).unwrap();
        assert!(!config.needs_browser());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let explicit = Path::new("/etc/ratesnap/custom.json");
        assert_eq!(
            resolve_config_path(Some(explicit)),
            Some(explicit.to_path_buf())
        );
    }
}
