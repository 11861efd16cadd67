//! Fixtures shared by the tool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use toolshell_client::fetch::{StatusCode, Url};
use toolshell_client::{
    AgentConfig, CacheAgent, CapturedResponse, HeadlessPage, Navigator, NavigatorConfig, Network, Request,
    ResponseSource,
};
use toolshell_core::{AppConfig, CacheDb, Error};

use super::Shell;

pub const ORIGIN: &str = "https://tools.example.com";

pub fn page(title: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <nav><a href="/dashboard">Home</a><a href="/logout">Log out</a></nav>
        <main><h1>{title}</h1><a href="/tools/notes">Notes</a><a href="/tools/dice-roller">Dice</a></main>
        </body></html>"#
    )
}

/// A site served from memory.
#[derive(Default)]
pub struct StaticSite {
    pages: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
}

impl StaticSite {
    pub fn new() -> Self {
        let site = Self::default();
        site.add("/offline", &page("Offline"));
        site.add("/dashboard", &page("Dashboard"));
        site.add("/tools/notes", &page("Notes"));
        site.add("/tools/dice-roller", &page("Dice Roller"));
        site
    }

    pub fn add(&self, path: &str, body: &str) {
        self.pages.lock().unwrap().insert(path.to_string(), body.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for StaticSite {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        let body = self.pages.lock().unwrap().get(request.url.path()).cloned();
        let (status, body) = match body {
            Some(body) => (StatusCode::OK, body),
            None => (StatusCode::NOT_FOUND, "not found".to_string()),
        };
        Ok(CapturedResponse {
            url: request.url.clone(),
            status,
            headers: vec![("content-type".into(), "text/html".into())],
            body: Bytes::from(body),
            source: ResponseSource::Network,
            fetch_ms: 1,
        })
    }
}

pub fn app_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        generation: "test-v1".into(),
        manifest: vec!["/offline".into(), "/dashboard".into(), "/tools/notes".into()],
        settle_delay_ms: 1,
        progress_clear_delay_ms: 1,
        ..Default::default()
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub struct Harness {
    pub site: Arc<StaticSite>,
    pub store: CacheDb,
    pub agent: Arc<CacheAgent>,
    pub shell: Arc<Shell>,
}

pub async fn harness() -> Harness {
    let config = app_config();
    let site = Arc::new(StaticSite::new());
    let store = CacheDb::open_in_memory().await.unwrap();
    let agent =
        Arc::new(CacheAgent::new(store.clone(), site.clone(), AgentConfig::from_app(&config).unwrap()));
    let host = Arc::new(HeadlessPage::new());
    let shell =
        Arc::new(Navigator::new(host, agent.clone(), NavigatorConfig::from_app(&config).unwrap()).unwrap());
    Harness { site, store, agent, shell }
}

/// Decode the JSON text content of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
