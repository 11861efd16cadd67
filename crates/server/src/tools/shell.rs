//! Headless shell tools.
//!
//! `shell_open` performs a full page load through the cache agent, the way a
//! browser would, and registers the agent on first use. `shell_navigate` and
//! `shell_back` drive the in-page navigator. When the navigator gives up on
//! an in-place swap the tools complete the full load it asked for.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toolshell_client::fetch::{Url, resolve};
use toolshell_client::navigator::{FetchedPage, collect_links};
use toolshell_client::{AgentState, CacheAgent, LinkTarget, NavigationOutcome, PageHost, Request, parse_page};
use toolshell_core::Error;

use super::{Shell, json_result};
use crate::error::ShellError;

/// Parameters for the shell_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellOpenParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,
}

/// Parameters for the shell_navigate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellNavigateParams {
    /// The clicked link's href attribute.
    pub href: String,

    /// The link's target attribute, if any.
    #[serde(default)]
    pub target: Option<String>,

    /// Whether the link carries a download attribute.
    #[serde(default)]
    pub download: bool,

    /// Scroll offset of the page at the time of the click.
    #[serde(default)]
    pub scroll_y: Option<f64>,
}

/// Parameters for the shell_back tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ShellBackParams {
    /// Scroll offset of the page before going back.
    #[serde(default)]
    pub scroll_y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellLink {
    pub text: String,
    pub href: String,
}

/// The headless page after a shell tool ran.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellView {
    /// "loaded", "swapped", "superseded", "passthrough" or "hard_reload".
    pub outcome: String,
    pub location: Option<String>,
    pub title: String,
    /// Inner HTML of the content region.
    pub content: String,
    pub scroll_y: f64,
    pub history_len: usize,
    /// Links inside the content region.
    pub links: Vec<ShellLink>,
}

impl ShellView {
    fn capture(shell: &Shell, outcome: &str) -> Self {
        let host = shell.host();
        let content = host.content();
        let links = collect_links(&content)
            .into_iter()
            .map(|l| ShellLink { text: l.text, href: l.href })
            .collect();
        Self {
            outcome: outcome.to_string(),
            location: host.location().map(|u| u.to_string()),
            title: host.title(),
            scroll_y: host.scroll_offset(),
            history_len: host.history().len(),
            content,
            links,
        }
    }
}

/// Load `url` as a full document through the agent and reset the navigator.
async fn full_load(agent: &CacheAgent, shell: &Shell, url: Url) -> Result<(), Error> {
    let response = agent.intercept(&Request::navigate(url.clone())).await?;
    let html = String::from_utf8_lossy(&response.body);

    let page = match parse_page(&html, &shell.config().content_selector) {
        Ok(page) => page,
        Err(Error::ContentMissing(_)) => {
            FetchedPage { title: None, content_html: html.into_owned(), scripts: Vec::new() }
        }
        Err(e) => return Err(e),
    };

    tracing::info!(%url, source = ?response.source, "full page load");
    shell.host().load(&url, &page);
    shell.reset(&url);
    Ok(())
}

/// Finish a navigation the navigator could not complete in place.
async fn settle(agent: &CacheAgent, shell: &Shell, outcome: NavigationOutcome) -> Result<&'static str, Error> {
    Ok(match outcome {
        NavigationOutcome::Swapped { .. } => "swapped",
        NavigationOutcome::Superseded => "superseded",
        NavigationOutcome::Passthrough => "passthrough",
        NavigationOutcome::HardReload(url) => {
            let target = shell.host().take_pending_navigation().unwrap_or(url);
            full_load(agent, shell, target).await?;
            "hard_reload"
        }
    })
}

pub async fn open_impl(agent: &CacheAgent, shell: &Shell, params: ShellOpenParams) -> Result<CallToolResult, McpError> {
    if params.url.is_empty() {
        return Err(ShellError::InvalidInput("url cannot be empty".into()).into());
    }
    let url = resolve(&agent.config().origin, &params.url).map_err(Error::from)?;
    full_load(agent, shell, url).await?;

    // The first page load registers the agent.
    if agent.state().await == AgentState::Parsed
        && let Err(e) = agent.start().await
    {
        tracing::warn!("cache agent registration failed: {e}");
    }

    json_result(&ShellView::capture(shell, "loaded"))
}

pub async fn navigate_impl(
    agent: &CacheAgent, shell: &Shell, params: ShellNavigateParams,
) -> Result<CallToolResult, McpError> {
    if shell.host().location().is_none() {
        return Err(ShellError::NoPage.into());
    }
    if let Some(offset) = params.scroll_y {
        shell.host().set_scroll(offset);
    }

    let link = LinkTarget { href: params.href, target: params.target, download: params.download, text: String::new() };
    let outcome = shell.click(&link).await;
    let label = settle(agent, shell, outcome).await?;

    json_result(&ShellView::capture(shell, label))
}

pub async fn back_impl(agent: &CacheAgent, shell: &Shell, params: ShellBackParams) -> Result<CallToolResult, McpError> {
    if shell.host().location().is_none() {
        return Err(ShellError::NoPage.into());
    }
    if let Some(offset) = params.scroll_y {
        shell.host().set_scroll(offset);
    }

    let previous = shell.host().back().ok_or(ShellError::NoHistory)?;
    let outcome = shell.traverse(previous).await;
    let label = settle(agent, shell, outcome).await?;

    json_result(&ShellView::capture(shell, label))
}
