// Copyright 2026 Ratesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ratesnap command-line entry point.

mod doctor;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ratesnap::{ChromiumLauncher, Orchestrator, SnapshotConfig};

#[derive(Parser)]
#[command(
    name = "ratesnap",
    about = "Ratesnap: daily PDF snapshots of bank FX rate pages",
    version,
    after_help = "Run 'ratesnap <command> --help' for details on each command.\nRun 'ratesnap' with no command to capture today's snapshots."
)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON (machine-readable).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture every configured source into today's folder (default).
    Run {
        /// Override the archive root directory.
        #[arg(long)]
        base_dir: Option<PathBuf>,
        /// Capture only the named source. Can be repeated.
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Print today's snapshot folder without creating it.
    Where,
    /// Check that a browser can be found.
    Doctor,
    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: SnapshotConfig, json: bool) -> Result<()> {
    tracing::info!(
        sources = config.sources.len(),
        base_dir = %config.base_dir.display(),
        "starting capture run"
    );
    let orchestrator = Orchestrator::new(config, ChromiumLauncher);
    let report = orchestrator
        .run_all(chrono::Utc::now())
        .await
        .context("snapshot run failed")?;
    output::print_report(&report, json)
}

fn load_config(path: Option<&Path>) -> Result<SnapshotConfig> {
    SnapshotConfig::load(path).context("failed to load configuration")
}

async fn dispatch(command: Commands, config_path: Option<&Path>, json: bool) -> Result<()> {
    match command {
        Commands::Run { base_dir, sources } => {
            let mut config = load_config(config_path)?;
            if let Some(dir) = base_dir {
                config.base_dir = dir;
            }
            config.retain_sources(&sources)?;
            run(config, json).await
        }
        Commands::Where => {
            let config = load_config(config_path)?;
            let tz = config.timezone()?;
            let bucket = ratesnap::resolve(chrono::Utc::now(), &tz);
            output::print_folder(&config.base_dir.join(bucket.relative_path()), json)
        }
        Commands::Doctor => doctor::run(&load_config(config_path)?, json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ratesnap", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config,
        log_level,
        log_json,
        json,
        command,
    } = Cli::parse();
    init_tracing(&log_level, log_json);

    // No subcommand → capture with no overrides
    let command = command.unwrap_or(Commands::Run {
        base_dir: None,
        sources: Vec::new(),
    });
    let result = dispatch(command, config.as_deref(), json).await;

    // Exit codes: 0 = session completed (even with failed sources), 1 = fatal
    if let Err(e) = &result {
        if json {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
