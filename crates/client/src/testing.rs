//! Scripted network for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use toolshell_core::Error;

use crate::fetch::{CapturedResponse, Network, Request, ResponseSource};

pub const ORIGIN: &str = "https://tools.example.com";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

#[derive(Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
    final_url: Option<Url>,
}

/// In-memory network answering from a route table.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, path: &str, body: &str) {
        self.route(path, 200, body, Duration::ZERO);
    }

    pub fn route(&self, path: &str, status: u16, body: &str, delay: Duration) {
        self.routes.lock().unwrap().insert(
            url(path).to_string(),
            Route { status, body: body.to_string(), delay, final_url: None },
        );
    }

    /// Answer `path` with a response whose final URL is `final_url`.
    pub fn redirect(&self, path: &str, final_url: Url, body: &str) {
        self.routes.lock().unwrap().insert(
            url(path).to_string(),
            Route { status: 200, body: body.to_string(), delay: Duration::ZERO, final_url: Some(final_url) },
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls().iter().filter(|c| **c == target).count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let route =
            route.unwrap_or(Route { status: 404, body: "not found".into(), delay: Duration::ZERO, final_url: None });

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        Ok(CapturedResponse {
            url: route.final_url.unwrap_or_else(|| request.url.clone()),
            status: StatusCode::from_u16(route.status).unwrap(),
            headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
            body: Bytes::from(route.body),
            source: ResponseSource::Network,
            fetch_ms: route.delay.as_millis() as u64,
        })
    }
}
