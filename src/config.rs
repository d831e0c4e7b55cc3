//! TOML configuration and the per-run settings derived from it.
//!
//! The file is read once by the CLI or server. Every pipeline run then
//! builds an immutable [`RunSettings`] from it and passes that value
//! explicitly to the query builder, client, and orchestrator.
//!
//! ```toml
//! [db]
//! path = "./data/mirror.sqlite"
//!
//! [github]
//! organization = "acme"
//! repositories = "website, docs, cli"
//! fetch_schedule = "daily"
//! fetch_count = 10
//! enable_redirect = true
//! # access_token = "ghp_..."   # or export GITHUB_TOKEN
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! # admin_token = "change-me"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::query::clamp_fetch_count;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub github: GithubConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Environment variable consulted when `access_token` is not set.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub organization: String,
    /// Comma-separated repository names, as entered by an administrator.
    #[serde(default)]
    pub repositories: String,
    #[serde(default)]
    pub fetch_schedule: FetchSchedule,
    #[serde(default = "default_fetch_count")]
    pub fetch_count: i64,
    #[serde(default)]
    pub enable_redirect: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_fetch_count() -> i64 {
    10
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RemoteConfig {
    /// Overrides the HTTP transport's default timeout when set.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required by `POST /admin/run`. The endpoint is
    /// disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_token: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// How often the schedule loop triggers a pipeline run.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchSchedule {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl FetchSchedule {
    /// Monthly is a fixed 30 days.
    pub fn interval(self) -> Duration {
        const HOUR: u64 = 60 * 60;
        let secs = match self {
            FetchSchedule::Hourly => HOUR,
            FetchSchedule::Daily => 24 * HOUR,
            FetchSchedule::Weekly => 7 * 24 * HOUR,
            FetchSchedule::Monthly => 30 * 24 * HOUR,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for FetchSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchSchedule::Hourly => "hourly",
            FetchSchedule::Daily => "daily",
            FetchSchedule::Weekly => "weekly",
            FetchSchedule::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl GithubConfig {
    /// Split the comma-separated repository list and trim each entry.
    ///
    /// Blank entries are kept; the orchestrator skips them.
    pub fn repository_list(&self) -> Vec<String> {
        split_repositories(&self.repositories)
    }

    fn resolve_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(&self.token_env).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

pub fn split_repositories(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|r| r.trim().to_string()).collect()
}

/// Bearer credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Immutable settings for a single pipeline run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub token: AccessToken,
    pub organization: String,
    pub repositories: Vec<String>,
    /// Already clamped to `1..=100`.
    pub fetch_count: u32,
    pub enable_redirect: bool,
    pub endpoint: String,
    pub timeout: Option<Duration>,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let github = &config.github;

        let token = github
            .resolve_token()
            .ok_or(ConfigError::Missing("github.access_token"))?;

        let organization = github.organization.trim().to_string();
        if organization.is_empty() {
            return Err(ConfigError::Missing("github.organization"));
        }

        Ok(Self {
            token: AccessToken::new(token),
            organization,
            repositories: github.repository_list(),
            fetch_count: clamp_fetch_count(github.fetch_count),
            enable_redirect: github.enable_redirect,
            endpoint: github.endpoint.clone(),
            timeout: config.remote.timeout_secs.map(Duration::from_secs),
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let endpoint = url::Url::parse(&config.github.endpoint)
        .with_context(|| format!("github.endpoint is not a URL: {}", config.github.endpoint))?;
    match endpoint.scheme() {
        "https" | "http" => {}
        other => anyhow::bail!("github.endpoint must be http(s), got '{}'", other),
    }

    if config.remote.timeout_secs == Some(0) {
        anyhow::bail!("remote.timeout_secs must be > 0");
    }

    if config.server.admin_token.as_deref().map(str::trim) == Some("") {
        anyhow::bail!("server.admin_token must not be empty when set");
    }

    Ok(config)
}
