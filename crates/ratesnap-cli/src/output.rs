// Copyright 2026 Ratesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Human and JSON rendering of command results.

use std::path::Path;

use anyhow::Result;
use ratesnap::{CaptureResult, RunReport};

pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// Summarize a completed run. Failed sources do not make this an error.
pub fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::to_value(report)?);
        return Ok(());
    }

    println!("Folder: {}", report.folder.display());
    for result in &report.results {
        match result {
            CaptureResult::Saved { source, path } => {
                println!("  [OK] {source:<16} {}", path.display());
            }
            CaptureResult::Failed { source, reason } => {
                println!("  [!!] {source:<16} FAILED: {reason}");
            }
        }
    }
    println!();
    println!(
        "Done. {} saved, {} failed.",
        report.saved(),
        report.failed()
    );
    Ok(())
}

pub fn print_folder(folder: &Path, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({
            "folder": folder.display().to_string(),
            "exists": folder.is_dir(),
        }));
    } else {
        println!("{}", folder.display());
    }
    Ok(())
}
