// Copyright 2026 Ratesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use anyhow::Result;
use ratesnap::browser::chromium::find_chromium;
use ratesnap::SnapshotConfig;

use crate::output;

/// Check browser availability, archive root and timezone.
pub fn run(config: &SnapshotConfig, json: bool) -> Result<()> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let chromium = find_chromium(config.chromium_path.as_deref());
    let tz = config.timezone().ok();
    let base_exists = config.base_dir.is_dir();
    let needs_browser = config.needs_browser();
    let ready = tz.is_some() && (chromium.is_some() || !needs_browser);

    if json {
        output::print_json(&serde_json::json!({
            "os": os,
            "arch": arch,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "base_dir": config.base_dir.display().to_string(),
            "base_dir_exists": base_exists,
            "utc_offset": config.utc_offset,
            "sources": config.sources.len(),
            "ready": ready,
        }));
        return Ok(());
    }

    println!("Ratesnap Doctor");
    println!("===============");
    println!();
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None if needs_browser => println!(
            "[!!] Chromium NOT found. Install Chrome or set {}.",
            ratesnap::browser::chromium::CHROMIUM_PATH_ENV
        ),
        None => println!("[??] Chromium NOT found (not needed for download-only sources)"),
    }

    if base_exists {
        println!("[OK] Archive root: {}", config.base_dir.display());
    } else {
        println!(
            "[OK] Archive root: {} (created on first run)",
            config.base_dir.display()
        );
    }

    match tz {
        Some(tz) => println!("[OK] Timezone offset: {tz}"),
        None => println!("[!!] Invalid utc_offset: {:?}", config.utc_offset),
    }
    println!("[OK] {} source(s) configured", config.sources.len());

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
