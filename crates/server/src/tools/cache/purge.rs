//! cache_purge tool implementation.
//!
//! Deletes a whole generation, or a single entry within one.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toolshell_client::CacheAgent;
use toolshell_client::fetch::resolve;
use toolshell_core::Error;

use crate::error::ShellError;
use crate::tools::agent::parse_method;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Generation to purge from.
    pub generation: String,

    /// Delete only this entry (absolute URL or path). Omit to delete the
    /// whole generation.
    #[serde(default)]
    pub url: Option<String>,

    /// HTTP method of the entry (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(agent: &CacheAgent, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.generation.trim().is_empty() {
        return Err(ShellError::InvalidInput("generation cannot be empty".into()).into());
    }
    let store = agent.store();

    let deleted = match params.url {
        Some(href) => {
            let method = parse_method(&params.method)?;
            let url = resolve(&agent.config().origin, &href).map_err(Error::from)?;
            u64::from(store.delete_entry(&params.generation, method.as_str(), url.as_str()).await?)
        }
        None => {
            let count = store.entry_count(&params.generation).await?;
            if store.delete_generation(&params.generation).await? {
                tracing::info!(generation = %params.generation, entries = count, "purged cache generation");
            }
            count
        }
    };

    json_result(&CachePurgeOutput { deleted })
}
