//! cache_get tool implementation.
//!
//! Looks up a stored response by request identity.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toolshell_client::CacheAgent;
use toolshell_client::fetch::resolve;
use toolshell_core::Error;

use super::target_generation;
use crate::tools::agent::parse_method;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Generation to read (default: the active one).
    #[serde(default)]
    pub generation: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(agent: &CacheAgent, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let method = parse_method(&params.method)?;
    let url = resolve(&agent.config().origin, &params.url).map_err(Error::from)?;
    let generation = target_generation(agent.store(), params.generation).await?;

    let entry = agent
        .store()
        .match_entry(&generation, method.as_str(), url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url} in {generation}")))?;

    json_result(&CacheGetOutput {
        generation,
        method: entry.method,
        url: entry.url,
        status: entry.status,
        headers: entry.headers,
        stored_at: entry.stored_at,
        body: String::from_utf8_lossy(&entry.body).into_owned(),
    })
}
