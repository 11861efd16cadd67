//! Cache agent tools: lifecycle control and intercepted fetches.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toolshell_client::fetch::{Method, resolve};
use toolshell_client::{CacheAgent, Request, RequestMode};
use toolshell_core::Error;

use super::json_result;
use crate::error::ShellError;

/// Output of `agent_install`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentInstallOutput {
    pub generation: String,
    /// Number of manifest assets stored.
    pub assets: usize,
}

/// Output of `agent_activate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentActivateOutput {
    pub generation: String,
    /// Generations deleted during activation.
    pub retired: Vec<String>,
}

/// Output of `agent_status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentStatusOutput {
    pub state: String,
    pub generation: String,
    pub active_generation: Option<String>,
    pub entries: u64,
}

/// Parameters for the agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// "subresource" (default) or "navigate".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_mode() -> String {
    "subresource".into()
}

fn default_method() -> String {
    "GET".into()
}

/// Output of `agent_fetch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    /// "network", "cache" or "fallback".
    pub source: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub fetch_ms: u64,
}

pub async fn install_impl(agent: &CacheAgent) -> Result<CallToolResult, McpError> {
    let report = agent.install().await?;
    json_result(&AgentInstallOutput { generation: report.generation, assets: report.assets })
}

pub async fn activate_impl(agent: &CacheAgent) -> Result<CallToolResult, McpError> {
    let report = agent.activate().await?;
    json_result(&AgentActivateOutput { generation: report.generation, retired: report.retired })
}

pub async fn status_impl(agent: &CacheAgent) -> Result<CallToolResult, McpError> {
    let status = agent.status().await?;
    json_result(&AgentStatusOutput {
        state: status.state.to_string(),
        generation: status.generation,
        active_generation: status.active_generation,
        entries: status.entries,
    })
}

fn parse_mode(mode: &str) -> Result<RequestMode, ShellError> {
    match mode {
        "navigate" => Ok(RequestMode::Navigate),
        "subresource" => Ok(RequestMode::Subresource),
        other => Err(ShellError::InvalidInput(format!("unsupported mode: {other}"))),
    }
}

pub(crate) fn parse_method(method: &str) -> Result<Method, ShellError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ShellError::InvalidInput(format!("invalid method: {method:?}")))
}

pub async fn fetch_impl(agent: &CacheAgent, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.is_empty() {
        return Err(ShellError::InvalidInput("url cannot be empty".into()).into());
    }
    let mode = parse_mode(&params.mode)?;
    let method = parse_method(&params.method)?;
    let url = resolve(&agent.config().origin, &params.url).map_err(Error::from)?;

    let request = Request { method, url, mode };
    let response = agent.intercept(&request).await?;

    let source = match response.source {
        toolshell_client::ResponseSource::Network => "network",
        toolshell_client::ResponseSource::Cache => "cache",
        toolshell_client::ResponseSource::Fallback => "fallback",
    };

    json_result(&AgentFetchOutput {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        source: source.to_string(),
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        headers: response.headers,
        fetch_ms: response.fetch_ms,
    })
}
