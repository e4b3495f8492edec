use crate::services::admission::GateStrategy;
use clap::Parser;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Process-level settings; every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "payment-adapter", about = "Deadline-bound payment submission adapter")]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = 9999)]
    pub server_port: u16,

    /// TOML file describing the processor and the accounts to use.
    #[arg(long = "config", env = "ADAPTER_CONFIG", default_value = "accounts.toml")]
    pub accounts_path: PathBuf,

    /// Optional CSV file receiving one row per processor call.
    #[arg(long, env = "REQUEST_LOG")]
    pub request_log: Option<PathBuf>,

    /// Runtime worker threads; defaults to the number of CPUs.
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,
}

impl Config {
    pub fn worker_threads(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid account file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid processor url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid account {account}: {reason}")]
    Account { account: String, reason: String },
    #[error("no accounts configured")]
    NoAccounts,
}

/// Static description of one processor account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    pub service_name: String,
    pub account_name: String,
    pub rate_limit_per_sec: u32,
    pub parallel_requests: u32,
    #[serde(rename = "average_processing_time_ms", with = "duration_ms")]
    pub average_processing_time: Duration,
    pub price: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    20_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsFile {
    pub processor_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub gate: GateStrategy,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl AccountsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let file: AccountsFile = toml::from_str(raw)?;
        file.validate()?;
        Ok(file)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.processor_url)?;

        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            let invalid = |reason: &str| ConfigError::Account {
                account: account.account_name.clone(),
                reason: reason.to_string(),
            };
            if !seen.insert(account.account_name.as_str()) {
                return Err(invalid("duplicate account name"));
            }
            if account.rate_limit_per_sec == 0 {
                return Err(invalid("rate_limit_per_sec must be positive"));
            }
            if account.parallel_requests == 0 {
                return Err(invalid("parallel_requests must be positive"));
            }
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
