//! Output folder allocation and the per-day manifest.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::bucket::TimeBucket;
use crate::types::{CaptureResult, Source, SnapshotError, SnapshotResult};

/// File written next to the snapshots describing the last run.
pub const MANIFEST_FILE: &str = "README.txt";

/// Extension used for rendered and downloaded documents.
pub const DOCUMENT_EXT: &str = "pdf";

/// Create `base/<bucket>` if missing and return it.
///
/// Concurrent callers racing on the same bucket both succeed.
pub fn ensure_folder(base: &Path, bucket: &TimeBucket) -> SnapshotResult<PathBuf> {
    let folder = base.join(bucket.relative_path());
    std::fs::create_dir_all(&folder).map_err(|source| SnapshotError::Io {
        path: folder.clone(),
        source,
    })?;
    Ok(folder)
}

/// `folder/<source.name>.<ext>`. Does not touch the filesystem.
pub fn output_path_for(folder: &Path, source: &Source, ext: &str) -> PathBuf {
    folder.join(format!("{}.{ext}", source.name))
}

/// Write the run manifest into `folder`, replacing any previous one.
pub fn write_manifest(
    folder: &Path,
    run_at: &str,
    results: &[CaptureResult],
) -> SnapshotResult<PathBuf> {
    let path = folder.join(MANIFEST_FILE);
    std::fs::write(&path, render_manifest(run_at, results)).map_err(|source| {
        SnapshotError::Io {
            path: path.clone(),
            source,
        }
    })?;
    Ok(path)
}

fn render_manifest(run_at: &str, results: &[CaptureResult]) -> String {
    let mut out = String::new();
    out.push_str("Daily currency rate PDF snapshots\n");
    let _ = writeln!(out, "Run: {run_at}");
    out.push_str("\nFiles:\n");
    for result in results {
        match result {
            CaptureResult::Saved { path, .. } => {
                let file = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let _ = writeln!(out, "- {file}");
            }
            CaptureResult::Failed { source, reason } => {
                let _ = writeln!(out, "- {source}.{DOCUMENT_EXT} (FAILED: {reason})");
            }
        }
    }
    out
}
