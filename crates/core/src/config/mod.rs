//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TOOLSHELL_*)
//! 2. TOML config file (if TOOLSHELL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How the navigator resolves two navigations whose fetches overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Only the most recently started navigation may mutate the page.
    #[default]
    LatestClick,
    /// Every fetch that resolves is applied; the last to arrive wins.
    LastArrival,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TOOLSHELL_*)
/// 2. TOML config file (if TOOLSHELL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via TOOLSHELL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the site the shell serves, e.g. `https://tools.example.com`.
    ///
    /// Set via TOOLSHELL_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache generation identifier. Bump it whenever cached assets change.
    ///
    /// Set via TOOLSHELL_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Page served when a navigation fails and nothing is cached.
    ///
    /// Set via TOOLSHELL_OFFLINE_PATH environment variable.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Paths fetched and stored during install. Must include `offline_path`.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Request paths containing this marker are never written to the cache.
    ///
    /// Set via TOOLSHELL_API_MARKER environment variable.
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via TOOLSHELL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via TOOLSHELL_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via TOOLSHELL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// CSS selector of the content region swapped on each transition.
    ///
    /// Set via TOOLSHELL_CONTENT_SELECTOR environment variable.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// Paths that always trigger a real navigation (logout and the like).
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// Delay between the fetch resolving and the content swap.
    ///
    /// Set via TOOLSHELL_SETTLE_DELAY_MS environment variable.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Delay before the loading indicator resets and replayed scripts are removed.
    ///
    /// Set via TOOLSHELL_PROGRESS_CLEAR_DELAY_MS environment variable.
    #[serde(default = "default_progress_clear_delay_ms")]
    pub progress_clear_delay_ms: u64,

    /// Resolution of overlapping navigations.
    ///
    /// Set via TOOLSHELL_OVERLAP_POLICY (`latest_click` or `last_arrival`).
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./toolshell-cache.sqlite")
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_generation() -> String {
    "l8tetools-v1".into()
}

fn default_offline_path() -> String {
    "/offline".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/offline",
        "/dashboard",
        "/static/style.css",
        "/static/script.js",
        "/static/search.js",
        "/static/manifest.json",
        "/static/icon-192.png",
        "/static/icon-512.png",
        "/tools/dice-roller",
        "/tools/wheel-of-fortune",
        "/tools/score-tracker",
        "/tools/color-picker",
        "/tools/bmi-calculator",
        "/tools/workday-calculator",
        "/tools/text-sorter",
        "/tools/regex-replacer",
        "/tools/morse-code",
        "/tools/notes",
        "/tools/prefix-suffix",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_api_marker() -> String {
    "/api/".into()
}

fn default_user_agent() -> String {
    "toolshell/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_content_selector() -> String {
    "main".into()
}

fn default_excluded_paths() -> Vec<String> {
    vec!["/logout".into()]
}

fn default_settle_delay_ms() -> u64 {
    150
}

fn default_progress_clear_delay_ms() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            generation: default_generation(),
            offline_path: default_offline_path(),
            manifest: default_manifest(),
            api_marker: default_api_marker(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            content_selector: default_content_selector(),
            excluded_paths: default_excluded_paths(),
            settle_delay_ms: default_settle_delay_ms(),
            progress_clear_delay_ms: default_progress_clear_delay_ms(),
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn progress_clear_delay(&self) -> Duration {
        Duration::from_millis(self.progress_clear_delay_ms)
    }

    /// Parsed site origin. Only valid after [`AppConfig::validate`] succeeded.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not a URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TOOLSHELL_`
    /// 2. TOML file from `TOOLSHELL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TOOLSHELL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TOOLSHELL_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
