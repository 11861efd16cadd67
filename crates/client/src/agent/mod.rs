//! Offline cache agent.
//!
//! Sits between the page and the network. One agent owns one cache generation
//! and moves through three phases:
//!
//! ### Install
//! - Fetch every manifest path concurrently.
//! - Any transport failure or non-2xx status fails the whole install; nothing
//!   is persisted and the agent becomes redundant.
//! - On success the generation is written in a single transaction and may be
//!   activated right away.
//!
//! ### Activate
//! - Delete every generation whose name differs from ours.
//! - Mark ours active and claim open pages.
//!
//! Until this agent activates, the generation recorded as active in the store
//! (left by an earlier agent or an earlier run) keeps answering. A failed
//! install therefore never takes the cache away from the page.
//!
//! ### Intercept
//! - Navigations: network first, then the cached entry, then the offline page.
//! - Everything else: stale-while-revalidate. The network request starts before
//!   the cache is read; a hit is returned immediately and the network answer
//!   only refreshes the store.
//! - Store writes are best effort. A failed write is logged and dropped.

pub mod policy;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::JoinSet;
use toolshell_core::{AppConfig, CacheDb, Error};

use crate::fetch::{CapturedResponse, Network, Request, ResponseSource, resolve};

pub use policy::{is_dynamic, should_store};

/// Agent settings, resolved from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub origin: Url,
    pub generation: String,
    pub offline_path: String,
    pub manifest: Vec<String>,
    pub api_marker: String,
}

impl AgentConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            origin,
            generation: config.generation.clone(),
            offline_path: config.offline_path.clone(),
            manifest: config.manifest.clone(),
            api_marker: config.api_marker.clone(),
        })
    }

    pub fn offline_url(&self) -> Result<Url, Error> {
        Ok(resolve(&self.origin, &self.offline_path)?)
    }
}

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this agent will never control a page.
    Redundant,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Parsed => "parsed",
            AgentState::Installing => "installing",
            AgentState::Installed => "installed",
            AgentState::Activating => "activating",
            AgentState::Activated => "activated",
            AgentState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub assets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub generation: String,
    /// Generations deleted during activation.
    pub retired: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub generation: String,
    pub active_generation: Option<String>,
    pub entries: u64,
}

/// Everything a background revalidation needs, detached from the agent.
#[derive(Clone)]
struct Revalidation {
    network: Arc<dyn Network>,
    store: CacheDb,
    generation: String,
    origin: Url,
    api_marker: String,
}

impl Revalidation {
    async fn run(self, request: Request, reply: oneshot::Sender<Result<CapturedResponse, Error>>) {
        match self.network.fetch(&request).await {
            Ok(response) => {
                let store = should_store(&request, &response, &self.origin, &self.api_marker);
                // The receiver is gone when the caller was served from cache.
                let _ = reply.send(Ok(response.clone()));
                if store {
                    match self.store.put_entry(&self.generation, &response.to_entry(&request)).await {
                        Ok(()) => tracing::debug!("refreshed cache entry for {}", request.url),
                        Err(e) => tracing::warn!(url = %request.url, "dropping cache write: {e}"),
                    }
                }
            }
            Err(err) => {
                tracing::debug!("revalidation of {} failed: {}", request.url, err);
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Versioned request cache sitting in front of a [`Network`].
pub struct CacheAgent {
    store: CacheDb,
    network: Arc<dyn Network>,
    config: AgentConfig,
    state: RwLock<AgentState>,
    background: Mutex<JoinSet<()>>,
}

impl CacheAgent {
    pub fn new(store: CacheDb, network: Arc<dyn Network>, config: AgentConfig) -> Self {
        Self {
            store,
            network,
            config,
            state: RwLock::new(AgentState::Parsed),
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheDb {
        &self.store
    }

    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    async fn set_state(&self, state: AgentState) {
        *self.state.write().await = state;
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<ActivationReport, Error> {
        self.install().await?;
        self.activate().await
    }

    /// Populate this agent's generation from the manifest, all or nothing.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.set_state(AgentState::Installing).await;
        tracing::info!(
            generation = %self.config.generation,
            assets = self.config.manifest.len(),
            "installing cache generation"
        );

        match self.populate().await {
            Ok(assets) => {
                self.set_state(AgentState::Installed).await;
                tracing::info!(generation = %self.config.generation, assets, "install complete");
                Ok(InstallReport { generation: self.config.generation.clone(), assets })
            }
            Err(e) => {
                self.set_state(AgentState::Redundant).await;
                tracing::warn!(generation = %self.config.generation, "install failed: {e}");
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<usize, Error> {
        let fetches = self.config.manifest.iter().map(|path| async move {
            let failed = |reason: String| Error::InstallFailed { path: path.clone(), reason };

            let url = resolve(&self.config.origin, path).map_err(|e| failed(e.to_string()))?;
            let request = Request::get(url);
            let response = self.network.fetch(&request).await.map_err(|e| failed(e.to_string()))?;
            if !response.status.is_success() {
                return Err(failed(format!("status {}", response.status.as_u16())));
            }
            Ok(response.to_entry(&request))
        });

        let entries = try_join_all(fetches).await?;
        self.store.populate_generation(&self.config.generation, entries).await
    }

    /// Retire every other generation and take control of open pages.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        match self.state().await {
            AgentState::Installed | AgentState::Activated => {}
            other => {
                return Err(Error::AgentInactive(format!("cannot activate from state {other}")));
            }
        }
        self.set_state(AgentState::Activating).await;

        match self.retire_others().await {
            Ok(retired) => {
                self.set_state(AgentState::Activated).await;
                tracing::info!(
                    generation = %self.config.generation,
                    retired = retired.len(),
                    "activated; claimed open clients"
                );
                Ok(ActivationReport { generation: self.config.generation.clone(), retired })
            }
            Err(e) => {
                self.set_state(AgentState::Installed).await;
                Err(e)
            }
        }
    }

    async fn retire_others(&self) -> Result<Vec<String>, Error> {
        let mut retired = Vec::new();
        for name in self.store.generation_names().await? {
            if name != self.config.generation && self.store.delete_generation(&name).await? {
                tracing::debug!("deleted stale cache generation {}", name);
                retired.push(name);
            }
        }
        self.store.mark_active(&self.config.generation).await?;
        Ok(retired)
    }

    pub async fn status(&self) -> Result<AgentStatus, Error> {
        Ok(AgentStatus {
            state: self.state().await,
            generation: self.config.generation.clone(),
            active_generation: self.store.active_generation().await?,
            entries: self.store.entry_count(&self.config.generation).await?,
        })
    }

    /// Answer a request according to the caching policy.
    ///
    /// When no generation is active the page is uncontrolled and every
    /// request goes straight to the network.
    pub async fn intercept(&self, request: &Request) -> Result<CapturedResponse, Error> {
        let Some(generation) = self.serving_generation().await else {
            return self.network.fetch(request).await;
        };

        if request.is_navigation() {
            self.network_first(request, &generation).await
        } else {
            self.stale_while_revalidate(request, &generation).await
        }
    }

    /// Our generation once activated, otherwise whatever the store has active.
    async fn serving_generation(&self) -> Option<String> {
        if self.state().await == AgentState::Activated {
            return Some(self.config.generation.clone());
        }
        match self.store.active_generation().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!("cannot read active generation: {e}");
                None
            }
        }
    }

    async fn network_first(&self, request: &Request, generation: &str) -> Result<CapturedResponse, Error> {
        let err = match self.network.fetch(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        tracing::debug!("navigation to {} failed ({}), trying cache", request.url, err);
        let method = request.method.as_str();
        if let Some(hit) = self.lookup(generation, method, &request.url, ResponseSource::Cache).await {
            return Ok(hit);
        }

        let offline = self.config.offline_url()?;
        if let Some(page) = self.lookup(generation, "GET", &offline, ResponseSource::Fallback).await {
            tracing::info!("serving offline page for {}", request.url);
            return Ok(page);
        }

        Err(Error::Offline(format!("{} unreachable and no offline page cached: {}", request.url, err)))
    }

    async fn stale_while_revalidate(&self, request: &Request, generation: &str) -> Result<CapturedResponse, Error> {
        let (reply, pending) = oneshot::channel();
        self.spawn_background(self.revalidation(generation).run(request.clone(), reply)).await;

        let method = request.method.as_str();
        if let Some(hit) = self.lookup(generation, method, &request.url, ResponseSource::Cache).await {
            tracing::debug!("cache hit for {}", request.url);
            return Ok(hit);
        }

        tracing::debug!("cache miss for {}", request.url);
        pending
            .await
            .map_err(|_| Error::Network(format!("fetch of {} was abandoned", request.url)))?
    }

    /// Read an entry, treating store errors as misses.
    async fn lookup(
        &self, generation: &str, method: &str, url: &Url, source: ResponseSource,
    ) -> Option<CapturedResponse> {
        let entry = match self.store.match_entry(generation, method, url.as_str()).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(%url, "cache read failed: {e}");
                return None;
            }
        };
        match CapturedResponse::from_entry(entry, source) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(%url, "unreadable cache entry: {e}");
                None
            }
        }
    }

    fn revalidation(&self, generation: &str) -> Revalidation {
        Revalidation {
            network: Arc::clone(&self.network),
            store: self.store.clone(),
            generation: generation.to_string(),
            origin: self.config.origin.clone(),
            api_marker: self.config.api_marker.clone(),
        }
    }

    async fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Wait for every background revalidation and store write to finish.
    pub async fn flush(&self) {
        let mut tasks = std::mem::take(&mut *self.background.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!("background cache task failed: {e}");
            }
        }
    }
}

#[async_trait]
impl Network for CacheAgent {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, Error> {
        self.intercept(request).await
    }
}
