//! cache_list tool implementation.
//!
//! Lists the generations in the store and the entries of one of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toolshell_client::CacheAgent;
use toolshell_core::EntryMeta;

use super::target_generation;
use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Generation to list (default: the active one).
    #[serde(default)]
    pub generation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Every generation in the store, oldest first.
    pub generations: Vec<String>,
    pub active_generation: Option<String>,
    /// The generation whose entries are listed.
    pub generation: String,
    pub entries: Vec<EntryMeta>,
}

pub async fn list_impl(agent: &CacheAgent, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let store = agent.store();
    let generation = target_generation(store, params.generation).await?;

    json_result(&CacheListOutput {
        generations: store.generation_names().await?,
        active_generation: store.active_generation().await?,
        entries: store.list_entries(&generation).await?,
        generation,
    })
}
