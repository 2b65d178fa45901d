//! Configuration file handling.
//!
//! This module handles loading `bhunter.toml` files, merging them with CLI
//! arguments and falling back to `BITBUCKET_*` environment variables for
//! credentials.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_BASE_URL;
use crate::enrich::DEFAULT_CONCURRENCY;

/// File names searched in each directory, first hit wins.
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "bhunter.local.toml",
    "bhunter.toml",
    ".bhunter.local.toml",
    ".bhunter.toml",
];

pub const ENV_USERNAME: &str = "BITBUCKET_USERNAME";
pub const ENV_APP_PASSWORD: &str = "BITBUCKET_APP_PASSWORD";
pub const ENV_WORKSPACE: &str = "BITBUCKET_WORKSPACE";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bitbucket credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Audit settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub app_password: Option<String>,

    /// Defaults to the username when unset.
    #[serde(default)]
    pub workspace: Option<String>,
}

/// Audit behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Maximum concurrent creator lookups.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Bitbucket API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Repository name terms to include.
    #[serde(default)]
    pub include: Vec<String>,

    /// Repository name terms to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Credentials and target workspace after all sources are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub app_password: String,
    pub workspace: String,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Search the current directory, then the home directory.
    ///
    /// Returns `Ok(None)` if no file exists, `Err` if one exists but can't be parsed.
    pub fn discover() -> Result<Option<(PathBuf, Self)>> {
        let mut dirs = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }
        if let Some(base) = directories::BaseDirs::new() {
            dirs.push(base.home_dir().to_path_buf());
        }
        Self::discover_in(&dirs)
    }

    /// Search the given directories in order for the first config file.
    pub fn discover_in(dirs: &[PathBuf]) -> Result<Option<(PathBuf, Self)>> {
        for dir in dirs {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if path.is_file() {
                    let config = Self::load(&path)?;
                    return Ok(Some((path, config)));
                }
            }
        }
        Ok(None)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref username) = args.username {
            self.auth.username = Some(username.clone());
        }
        if let Some(ref password) = args.password {
            self.auth.app_password = Some(password.clone());
        }
        if let Some(ref workspace) = args.workspace {
            self.auth.workspace = Some(workspace.clone());
        }

        if let Some(concurrency) = args.concurrency {
            self.audit.concurrency = concurrency;
        }
        if let Some(ref base_url) = args.base_url {
            self.audit.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.audit.timeout_seconds = timeout;
        }
        if let Some(ref include) = args.include {
            self.audit.include = include.clone();
        }
        if let Some(ref exclude) = args.exclude {
            self.audit.exclude = exclude.clone();
        }
    }

    /// Fill missing credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill missing credentials from `lookup`.
    ///
    /// The environment is consulted only while username or password is
    /// still missing, and then only for the fields that are unset.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.auth.username.is_some() && self.auth.app_password.is_some() {
            return;
        }

        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if self.auth.username.is_none() {
            self.auth.username = non_empty(ENV_USERNAME);
        }
        if self.auth.app_password.is_none() {
            self.auth.app_password = non_empty(ENV_APP_PASSWORD);
        }
        if self.auth.workspace.is_none() {
            self.auth.workspace = non_empty(ENV_WORKSPACE);
        }
    }

    /// Resolve the final credentials, defaulting the workspace to the username.
    pub fn credentials(&self) -> Result<Credentials> {
        let (username, app_password) = match (&self.auth.username, &self.auth.app_password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u.clone(), p.clone()),
            _ => bail!(
                "Username and app password are required. Pass -u/-p, set them in \
                 bhunter.toml, or export {} and {}",
                ENV_USERNAME,
                ENV_APP_PASSWORD
            ),
        };

        let workspace = self
            .auth
            .workspace
            .clone()
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| username.clone());

        Ok(Credentials {
            username,
            app_password,
            workspace,
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        let body = toml::to_string_pretty(&config).unwrap_or_else(|_| String::new());
        format!(
            "# bhunter configuration\n\
             #\n\
             # [auth]\n\
             # username = \"your-username\"\n\
             # app_password = \"your-app-password\"\n\
             # workspace = \"your-workspace\"\n\
             \n{}",
            body
        )
    }
}
