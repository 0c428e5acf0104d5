//! Configuration file handling for sse-cli

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Retries used when neither the CLI nor the config file sets one
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default stream URL
    pub url: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Overall subscription timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Total reconnect attempts per watch run
    pub max_retries: Option<u32>,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("sse-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: ArgOverrides<'_>) -> MergedConfig {
        let mut headers = self.headers.clone();
        for (name, value) in args.headers {
            headers.insert(name.clone(), value.clone());
        }

        MergedConfig {
            url: args.url.map(String::from).or_else(|| self.url.clone()),
            output: args.output.map(String::from).or_else(|| self.output.clone()),
            no_color: args.no_color || self.no_color.unwrap_or(false),
            timeout: args
                .timeout_secs
                .or(self.timeout_secs)
                .map(Duration::from_secs),
            max_retries: args
                .max_retries
                .or(self.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            headers,
        }
    }
}

/// Values given on the command line; `None` defers to the config file
#[derive(Debug, Default)]
pub struct ArgOverrides<'a> {
    pub url: Option<&'a str>,
    pub output: Option<&'a str>,
    pub no_color: bool,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub headers: &'a [(String, String)],
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub url: Option<String>,
    pub output: Option<String>,
    pub no_color: bool,
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub headers: BTreeMap<String, String>,
}
