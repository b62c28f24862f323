//! TOML configuration for the `cfh` binary.
//!
//! ```toml
//! [confluence]
//! base_url = "https://acme.atlassian.net"
//! email = "bot@acme.com"
//! # api_token = "..."   # or set CONFLUENCE_API_TOKEN
//! timeout_secs = 30
//!
//! [db]
//! path = "./data/cfh.sqlite"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::activities::Credentials;

/// Environment variable consulted when `confluence.api_token` is absent.
pub const API_TOKEN_ENV: &str = "CONFLUENCE_API_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub confluence: ConfluenceConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Clone)]
pub struct ConfluenceConfig {
    pub base_url: String,
    pub email: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for ConfluenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Credentials for the configured site, as passed to every operation.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            base_url: self.confluence.base_url.clone(),
            email: self.confluence.email.clone(),
            api_token: self.confluence.api_token.clone().unwrap_or_default(),
            timeout_secs: Some(self.confluence.timeout_secs),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.confluence.api_token.as_deref().unwrap_or("").is_empty() {
        config.confluence.api_token = std::env::var(API_TOKEN_ENV).ok();
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let base = config.confluence.base_url.trim();
    if base.is_empty() {
        bail!("confluence.base_url must not be empty");
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        bail!(
            "confluence.base_url must start with http:// or https:// (got '{}')",
            base
        );
    }
    if config.confluence.email.trim().is_empty() {
        bail!("confluence.email must not be empty");
    }
    if config.confluence.api_token.as_deref().unwrap_or("").is_empty() {
        bail!(
            "confluence.api_token is not set and {} is not in the environment",
            API_TOKEN_ENV
        );
    }
    if config.confluence.timeout_secs == 0 {
        bail!("confluence.timeout_secs must be > 0");
    }
    Ok(())
}
