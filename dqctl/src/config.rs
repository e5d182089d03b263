//! Client configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `DQCTL_CONFIG`
//! environment variable. A missing file is not an error; every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `DQCTL_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `DQCTL_STORAGE__TYPE=memory` sets the `storage.type` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use dqctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Talking to {}", config.api_base_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Point at a different backend
//! DQCTL_API_BASE_URL="https://dq.example.com"
//!
//! # Keep the credential in memory only
//! DQCTL_STORAGE__TYPE=memory
//!
//! # Tighter request timeout
//! DQCTL_REQUEST_TIMEOUT=3s
//! ```

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// CLI args - the config file plus an optional command to run against the backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DQCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and persist the issued credential
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "DQCTL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "DQCTL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the persisted credential
    Logout,
    /// Show the identity behind the persisted credential
    Whoami,
    /// Run the navigation guard for a route and print where it lands
    Navigate { path: String },
    /// Print dashboard statistics
    Stats,
}

/// Main client configuration.
///
/// All fields have defaults defined in the `Default` implementation, matching a backend running
/// locally on port 8000.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the DQ backend API
    pub api_base_url: Url,
    /// Timeout applied to every backend request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Where the bearer credential is persisted between runs
    pub storage: StorageConfig,
    /// Route navigated to on bootstrap
    pub initial_route: String,
    /// Maximum number of guard redirects followed for one navigation
    pub max_redirects: usize,
}

/// Credential storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// JSON file holding the credential under `key`; survives restarts
    File {
        #[serde(default = "StorageConfig::default_path")]
        path: PathBuf,
        #[serde(default = "StorageConfig::default_key")]
        key: String,
    },
    /// Process memory only; every run starts logged out
    Memory,
}

impl StorageConfig {
    fn default_path() -> PathBuf {
        PathBuf::from(".dqctl/session.json")
    }

    fn default_key() -> String {
        "token".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            path: Self::default_path(),
            key: Self::default_key(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse("http://localhost:8000").expect("static URL is valid"),
            request_timeout: Duration::from_secs(10),
            storage: StorageConfig::default(),
            initial_route: crate::types::routes::HOME.to_string(),
            max_redirects: 8,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: api_base_url must be an http(s) URL, got scheme '{}'",
                    self.api_base_url.scheme()
                ),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: request_timeout must be greater than 0".to_string(),
            });
        }

        if let StorageConfig::File { key, .. } = &self.storage
            && key.trim().is_empty()
        {
            return Err(Error::Internal {
                operation: "Config validation: storage.key cannot be empty".to_string(),
            });
        }

        if !self.initial_route.starts_with('/') {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: initial_route must be an absolute path, got '{}'",
                    self.initial_route
                ),
            });
        }

        if self.max_redirects == 0 {
            return Err(Error::Internal {
                operation: "Config validation: max_redirects must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values. DQCTL_CONFIG and DQCTL_PASSWORD
            // belong to the CLI, not the config tree
            .merge(Env::prefixed("DQCTL_").ignore(&["config", "password"]).split("__"))
    }
}
