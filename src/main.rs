//! Parallel SQL dump loader
//!
//! Restores a directory of per-database, per-table SQL dump files into a
//! MySQL server using a fixed pool of connections.

// dumploader/src/main.rs
mod config;
mod errors;
mod restore;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use config::{LoaderConfig, PASSWORD_ENV_VAR, RawJsonConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Restore a SQL dump directory in parallel", long_about = None)]
struct Cli {
    /// JSON config file; command-line flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server address as host:port
    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    user: Option<String>,

    /// Falls back to the LOADER_PASSWORD environment variable
    #[arg(long)]
    password: Option<String>,

    /// Number of pooled connections (and concurrent workers)
    #[arg(long)]
    threads: Option<usize>,

    /// Dump directory to restore
    #[arg(long = "dir")]
    dump_dir: Option<PathBuf>,

    /// Milliseconds between progress lines
    #[arg(long = "interval-ms")]
    progress_interval_ms: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> RawJsonConfig {
        RawJsonConfig {
            address: self.address.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            threads: self.threads,
            dump_dir: self.dump_dir.clone(),
            progress_interval_ms: self.progress_interval_ms,
        }
    }
}

/// Main entry point for the loader
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app(Cli::parse()).await {
        Ok(summary) => {
            println!(
                "✅ Restore completed: {:.2}MB in {:.2}sec ({:.2}MB/sec).",
                summary.megabytes(),
                summary.elapsed.as_secs_f64(),
                summary.rate()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<restore::RestoreSummary> {
    let raw = match &cli.config {
        Some(path) => RawJsonConfig::load_from_json(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RawJsonConfig::default(),
    };
    let config = LoaderConfig::from_raw(raw.merge(cli.overrides()), env::var(PASSWORD_ENV_VAR).ok())
        .context("Invalid loader configuration")?;

    println!(
        "🔄 Restoring {} into {} with {} connections...",
        config.dump_dir.display(),
        config.address,
        config.threads
    );
    restore::run_restore_flow(&config).await.context("Restore process failed")
}
