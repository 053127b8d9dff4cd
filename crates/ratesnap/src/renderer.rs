//! Printing the loaded page to a document on disk.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::{MediaType, PageContext, PaperFormat, PdfOptions};
use crate::types::{SnapshotError, SnapshotResult};

/// Fixed render settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub format: PaperFormat,
    pub print_background: bool,
    /// Stylesheet media applied before rendering. `None` leaves the page as is.
    pub media: Option<MediaType>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            print_background: true,
            media: Some(MediaType::Print),
        }
    }
}

impl RenderOptions {
    fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            format: self.format,
            print_background: self.print_background,
        }
    }
}

/// Print the current view of `page` into `out_path`, replacing any existing
/// file. Returns the number of bytes written.
pub async fn render(
    page: &mut dyn PageContext,
    out_path: &Path,
    options: &RenderOptions,
) -> SnapshotResult<usize> {
    if let Some(media) = options.media {
        if let Err(e) = page.emulate_media(media).await {
            debug!("{} media emulation unavailable: {e:#}", media.as_str());
        }
    }

    let bytes = page
        .print_to_pdf(&options.pdf_options())
        .await
        .map_err(|e| SnapshotError::Render {
            path: out_path.to_path_buf(),
            source: e.into(),
        })?;

    tokio::fs::write(out_path, &bytes)
        .await
        .map_err(|e| SnapshotError::Render {
            path: out_path.to_path_buf(),
            source: Box::new(e),
        })?;

    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::NavigationResult;
    use async_trait::async_trait;

    #[derive(Default)]
    struct PrintPage {
        media_supported: bool,
        media_calls: Vec<MediaType>,
        printed_with: Option<PdfOptions>,
        fail_print: bool,
    }

    #[async_trait]
    impl PageContext for PrintPage {
        async fn goto(&mut self, url: &str, _timeout_ms: u64) -> anyhow::Result<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 0,
            })
        }
        async fn emulate_media(&mut self, media: MediaType) -> anyhow::Result<()> {
            self.media_calls.push(media);
            if self.media_supported {
                Ok(())
            } else {
                anyhow::bail!("unsupported")
            }
        }
        async fn print_to_pdf(&mut self, options: &PdfOptions) -> anyhow::Result<Vec<u8>> {
            if self.fail_print {
                anyhow::bail!("renderer crashed");
            }
            self.printed_with = Some(*options);
            Ok(b"%PDF-1.7 fake".to_vec())
        }
        async fn evaluate(&mut self, _script: &str) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn test_render_writes_a4_with_background() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("AXIS_Rates.pdf");
        let mut page = PrintPage {
            media_supported: true,
            ..Default::default()
        };

        let written = render(&mut page, &out, &RenderOptions::default())
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 fake");
        assert_eq!(page.media_calls, vec![MediaType::Print]);
        let opts = page.printed_with.unwrap();
        assert_eq!(opts.format, PaperFormat::A4);
        assert!(opts.print_background);
    }

    #[tokio::test]
    async fn test_render_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ICICI_Rates.pdf");
        std::fs::write(&out, b"yesterday's much longer content").unwrap();

        render(&mut PrintPage::default(), &out, &RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn test_unsupported_media_emulation_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.pdf");
        let mut page = PrintPage::default();
        render(&mut page, &out, &RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(page.media_calls.len(), 1);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_emulation_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = PrintPage::default();
        let opts = RenderOptions {
            media: None,
            ..Default::default()
        };
        render(&mut page, &dir.path().join("x.pdf"), &opts)
            .await
            .unwrap();
        assert!(page.media_calls.is_empty());
    }

    #[tokio::test]
    async fn test_screen_media_and_letter_paper() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = PrintPage {
            media_supported: true,
            ..Default::default()
        };
        let opts: RenderOptions =
            serde_json::from_str(r#"{"format": "Letter", "media": "screen"}"#).unwrap();
        render(&mut page, &dir.path().join("x.pdf"), &opts)
            .await
            .unwrap();
        assert_eq!(page.media_calls, vec![MediaType::Screen]);
        let printed = page.printed_with.unwrap();
        assert_eq!(printed.format, PaperFormat::Letter);
        assert_eq!(printed.format.size_inches(), (8.5, 11.0));
        assert!(printed.print_background);
    }

    #[tokio::test]
    async fn test_print_failure_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.pdf");
        let mut page = PrintPage {
            fail_print: true,
            ..Default::default()
        };
        let err = render(&mut page, &out, &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Render { .. }));
        assert!(!err.is_fatal());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing-dir").join("x.pdf");
        let err = render(&mut PrintPage::default(), &out, &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Render { .. }));
    }
}
