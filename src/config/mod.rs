// dumploader/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_THREADS: usize = 16;
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 10_000;
pub const PASSWORD_ENV_VAR: &str = "LOADER_PASSWORD";

// Struct for deserializing config.json; every field may also come from the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub address: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub threads: Option<usize>,
    pub dump_dir: Option<PathBuf>,
    pub progress_interval_ms: Option<u64>,
}

/// Validated settings for one restore run.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub address: String,
    pub user: String,
    pub password: String,
    pub threads: usize,
    pub dump_dir: PathBuf,
    pub progress_interval: Duration,
}

impl RawJsonConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    /// Fields set in `overrides` win over the ones already present.
    pub fn merge(self, overrides: RawJsonConfig) -> Self {
        RawJsonConfig {
            address: overrides.address.or(self.address),
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            threads: overrides.threads.or(self.threads),
            dump_dir: overrides.dump_dir.or(self.dump_dir),
            progress_interval_ms: overrides.progress_interval_ms.or(self.progress_interval_ms),
        }
    }
}

impl LoaderConfig {
    /// Validates the merged raw settings. `env_password` is only consulted
    /// when neither the file nor the command line carries a password.
    pub fn from_raw(raw: RawJsonConfig, env_password: Option<String>) -> Result<Self> {
        let address = raw
            .address
            .filter(|s| !s.trim().is_empty())
            .context("address must be set in config.json or with --address")?;
        let user = raw
            .user
            .filter(|s| !s.trim().is_empty())
            .context("user must be set in config.json or with --user")?;
        let dump_dir = raw
            .dump_dir
            .filter(|p| !p.as_os_str().is_empty())
            .context("dump_dir must be set in config.json or with --dir")?;

        let threads = raw.threads.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            anyhow::bail!("threads must be at least 1");
        }
        let interval_ms = raw
            .progress_interval_ms
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL_MS);
        if interval_ms == 0 {
            anyhow::bail!("progress_interval_ms must be at least 1");
        }

        Ok(LoaderConfig {
            address,
            user,
            password: raw.password.or(env_password).unwrap_or_default(),
            threads,
            dump_dir,
            progress_interval: Duration::from_millis(interval_ms),
        })
    }

    /// Connection URL for the target server, with credentials percent-encoded.
    pub fn server_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("mysql://{}", self.address))
            .with_context(|| format!("Invalid server address: {}", self.address))?;
        url.set_username(&self.user)
            .map_err(|_| anyhow::anyhow!("Cannot set user on server URL for {}", self.address))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| anyhow::anyhow!("Cannot set password on server URL for {}", self.address))?;
        }
        Ok(url)
    }
}
