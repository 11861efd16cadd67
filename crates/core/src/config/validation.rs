//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

const MAX_DELAY_MS: u64 = 10_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not a bare http(s) origin
    /// - `generation`, `api_marker`, `user_agent` or `content_selector` is empty
    /// - `offline_path` or a manifest entry is not an absolute path
    /// - `offline_path` is not part of the manifest
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - a transition delay exceeds 10 seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }
        if origin.host_str().is_none() {
            return Err(invalid("origin", "must have a host"));
        }
        if origin.path() != "/" || origin.query().is_some() || origin.fragment().is_some() {
            return Err(invalid("origin", "must not carry a path, query or fragment"));
        }

        if self.generation.trim().is_empty() {
            return Err(invalid("generation", "must not be empty"));
        }

        if !self.offline_path.starts_with('/') {
            return Err(invalid("offline_path", "must start with '/'"));
        }
        if let Some(entry) = self.manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("manifest", format!("entry {entry:?} must start with '/'")));
        }
        if !self.manifest.contains(&self.offline_path) {
            return Err(invalid("manifest", "must include offline_path"));
        }

        if self.api_marker.is_empty() {
            return Err(invalid("api_marker", "must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.content_selector.trim().is_empty() {
            return Err(invalid("content_selector", "must not be empty"));
        }

        if self.settle_delay_ms > MAX_DELAY_MS {
            return Err(invalid("settle_delay_ms", "must not exceed 10 seconds"));
        }
        if self.progress_clear_delay_ms > MAX_DELAY_MS {
            return Err(invalid("progress_clear_delay_ms", "must not exceed 10 seconds"));
        }

        if self.excluded_paths.iter().any(|p| self.manifest.contains(p)) {
            tracing::warn!(
                excluded_count = self.excluded_paths.len(),
                "An excluded path is also in the install manifest; it will be cached but never swapped in place"
            );
        }

        Ok(())
    }
}
