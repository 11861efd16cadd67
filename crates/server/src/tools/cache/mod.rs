//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and pruning the generation store.

pub mod get;
pub mod list;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use list::{CacheListParams, list_impl};
pub use purge::{CachePurgeParams, purge_impl};

use toolshell_core::{CacheDb, Error};

/// Pick the requested generation, or the active one.
pub(crate) async fn target_generation(store: &CacheDb, requested: Option<String>) -> Result<String, Error> {
    match requested {
        Some(name) => Ok(name),
        None => store
            .active_generation()
            .await?
            .ok_or_else(|| Error::CacheMiss("no active generation".into())),
    }
}
