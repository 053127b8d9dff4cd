// Copyright 2026 Ratesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ratesnap: daily print-quality snapshots of bank FX rate pages.
//!
//! Pages are loaded in a single headless browser session, printed to A4 PDFs
//! and archived under `<base>/<YYYY>/<Month YY>/<DDMon YY>/`, with the day
//! resolved in a fixed civil timezone.

pub mod browser;
pub mod bucket;
pub mod config;
pub mod download;
pub mod navigator;
pub mod orchestrator;
pub mod readiness;
pub mod renderer;
pub mod storage;
pub mod types;

pub use browser::chromium::ChromiumLauncher;
pub use bucket::{resolve, TimeBucket};
pub use config::SnapshotConfig;
pub use navigator::{navigate, RetryPolicy};
pub use orchestrator::Orchestrator;
pub use renderer::{render, RenderOptions};
pub use storage::{ensure_folder, output_path_for};
pub use types::*;
