//! MCP tool implementations.
//!
//! This module contains all tools exposed by the toolshell server.

pub mod agent;
pub mod cache;
pub mod shell;

#[cfg(test)]
pub(crate) mod testing;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use toolshell_client::{HeadlessPage, Navigator};
use toolshell_core::Error;

/// The navigator driving the server's headless page.
pub type Shell = Navigator<HeadlessPage>;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
