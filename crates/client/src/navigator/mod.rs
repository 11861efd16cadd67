//! In-page navigator.
//!
//! Intercepts same-origin link clicks and swaps the content region of the
//! current document instead of performing a full load. Each transition:
//!
//! 1. records the scroll offset of the page being left
//! 2. pushes the target into history (forward navigation only)
//! 3. raises the loading indicator and marks the region as transitioning
//! 4. fetches the target through the [`Network`] seam
//! 5. parses the content region and title
//! 6. swaps them in after a settle delay
//! 7. restores the remembered scroll offset of the target, or the top
//! 8. replays the behavior scripts of the new content and runs the
//!    re-initialization hooks, then clears the indicator
//!
//! Any failure abandons the transition and asks the host for a full load of
//! the target.
//!
//! Every transition carries a sequence number. Under
//! [`OverlapPolicy::LatestClick`] a transition that is no longer the latest
//! when its fetch completes is discarded; under [`OverlapPolicy::LastArrival`]
//! every completed transition is applied in arrival order.

pub mod document;
pub mod host;
pub mod links;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Url;
use toolshell_core::{AppConfig, Error, OverlapPolicy};

use crate::fetch::{Network, Request};

pub use document::{BehaviorScript, FetchedPage, parse_page, validate_selector};
pub use host::{HeadlessPage, PageHost, ScriptHandle, ScrollBehavior};
pub use links::{LinkDecision, LinkTarget, classify, collect_links};

/// Loading indicator checkpoints.
const PROGRESS_STARTED: u8 = 30;
const PROGRESS_FETCHED: u8 = 70;
const PROGRESS_DONE: u8 = 100;
const PROGRESS_HIDDEN: u8 = 0;

#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub origin: Url,
    /// CSS selector of the content region.
    pub content_selector: String,
    /// Paths that always get a full navigation.
    pub excluded_paths: Vec<String>,
    pub settle_delay: Duration,
    pub progress_clear_delay: Duration,
    pub overlap_policy: OverlapPolicy,
}

impl NavigatorConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            origin: config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?,
            content_selector: config.content_selector.clone(),
            excluded_paths: config.excluded_paths.clone(),
            settle_delay: config.settle_delay(),
            progress_clear_delay: config.progress_clear_delay(),
            overlap_policy: config.overlap_policy,
        })
    }
}

/// How the target was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Link click; adds a history entry.
    Push,
    /// Back/forward; history already moved.
    Traverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The content region now shows `url`.
    Swapped { url: Url, title: Option<String>, scripts: usize },
    /// A newer transition started before this one finished.
    Superseded,
    /// The link is not intercepted; the platform handles it.
    Passthrough,
    /// The transition failed; the host was asked to load the URL for real.
    HardReload(Url),
}

type ReinitHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct NavState {
    /// Path whose content is on screen. Moves only when a swap is applied.
    current_path: String,
    scroll_positions: HashMap<String, f64>,
    latest: u64,
}

pub struct Navigator<H: PageHost> {
    host: Arc<H>,
    network: Arc<dyn Network>,
    config: NavigatorConfig,
    hooks: Vec<ReinitHook>,
    state: Mutex<NavState>,
}

impl<H: PageHost> Navigator<H> {
    pub fn new(host: Arc<H>, network: Arc<dyn Network>, config: NavigatorConfig) -> Result<Self, Error> {
        validate_selector(&config.content_selector)?;
        Ok(Self { host, network, config, hooks: Vec::new(), state: Mutex::new(NavState::default()) })
    }

    /// Register a callback run after every swap, once scripts have been replayed.
    pub fn on_reinit(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, NavState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_path(&self) -> String {
        self.state().current_path.clone()
    }

    /// Last recorded scroll offset for `path`.
    pub fn scroll_memory(&self, path: &str) -> Option<f64> {
        self.state().scroll_positions.get(path).copied()
    }

    /// Forget all navigation state after a full page load of `url`.
    pub fn reset(&self, url: &Url) {
        let mut state = self.state();
        state.current_path = url.path().to_string();
        state.scroll_positions.clear();
        // In-flight transitions belong to the old document.
        state.latest += 1;
    }

    pub fn classify(&self, link: &LinkTarget) -> LinkDecision {
        classify(link, &self.config.origin, &self.config.excluded_paths)
    }

    /// Handle a click on `link`.
    pub async fn click(&self, link: &LinkTarget) -> NavigationOutcome {
        match self.classify(link) {
            LinkDecision::Intercept(url) => self.navigate(url).await,
            LinkDecision::Default => {
                tracing::debug!(href = %link.href, "link not intercepted");
                NavigationOutcome::Passthrough
            }
        }
    }

    /// Swap to `url`, adding a history entry.
    pub async fn navigate(&self, url: Url) -> NavigationOutcome {
        self.transition(url, NavigationKind::Push).await
    }

    /// Swap to `url` after the history cursor moved.
    pub async fn traverse(&self, url: Url) -> NavigationOutcome {
        self.transition(url, NavigationKind::Traverse).await
    }

    fn is_current(&self, seq: u64) -> bool {
        match self.config.overlap_policy {
            OverlapPolicy::LatestClick => self.state().latest == seq,
            OverlapPolicy::LastArrival => true,
        }
    }

    fn begin(&self, url: &Url, kind: NavigationKind) -> u64 {
        let offset = self.host.scroll_offset();
        let seq = {
            let mut state = self.state();
            let leaving = state.current_path.clone();
            state.scroll_positions.insert(leaving, offset);
            state.latest += 1;
            state.latest
        };

        if kind == NavigationKind::Push {
            self.host.push_history(url);
        }
        self.host.set_progress(PROGRESS_STARTED);
        self.host.set_transitioning(true);
        seq
    }

    async fn transition(&self, url: Url, kind: NavigationKind) -> NavigationOutcome {
        let seq = self.begin(&url, kind);
        tracing::debug!(%url, seq, ?kind, "transition started");

        let page = match self.load(&url).await {
            Ok(page) => page,
            Err(e) if self.is_current(seq) => {
                tracing::info!(%url, "in-place navigation failed, falling back to full load: {e}");
                self.host.set_transitioning(false);
                self.host.set_progress(PROGRESS_HIDDEN);
                self.host.hard_navigate(&url);
                return NavigationOutcome::HardReload(url);
            }
            Err(e) => {
                tracing::debug!(%url, seq, "stale transition failed: {e}");
                return NavigationOutcome::Superseded;
            }
        };

        if !self.is_current(seq) {
            tracing::warn!(%url, seq, "discarding superseded navigation");
            return NavigationOutcome::Superseded;
        }
        self.host.set_progress(PROGRESS_FETCHED);

        tokio::time::sleep(self.config.settle_delay).await;
        if !self.is_current(seq) {
            tracing::warn!(%url, seq, "discarding superseded navigation");
            return NavigationOutcome::Superseded;
        }

        self.state().current_path = url.path().to_string();
        self.host.replace_content(&page.content_html);
        if let Some(title) = &page.title {
            self.host.set_title(title);
        }
        self.host.set_transitioning(false);
        self.host.set_progress(PROGRESS_DONE);

        self.restore_scroll(&url, kind);
        let scripts = self.replay(&page.scripts);

        tokio::time::sleep(self.config.progress_clear_delay).await;
        if self.is_current(seq) {
            self.host.set_progress(PROGRESS_HIDDEN);
        }

        tracing::debug!(%url, seq, scripts, "transition complete");
        NavigationOutcome::Swapped { url, title: page.title, scripts }
    }

    async fn load(&self, url: &Url) -> Result<FetchedPage, Error> {
        let response = self.network.fetch(&Request::get(url.clone())).await?;
        if !response.status.is_success() {
            return Err(Error::Network(format!("{url} answered {}", response.status.as_u16())));
        }
        parse_page(&String::from_utf8_lossy(&response.body), &self.config.content_selector)
    }

    fn restore_scroll(&self, url: &Url, kind: NavigationKind) {
        let remembered = self.scroll_memory(url.path());
        match (remembered, kind) {
            (Some(offset), NavigationKind::Push) => self.host.scroll_to(offset, ScrollBehavior::Instant),
            (Some(offset), NavigationKind::Traverse) => self.host.scroll_to(offset, ScrollBehavior::Smooth),
            (None, _) => self.host.scroll_to(0.0, ScrollBehavior::Instant),
        }
    }

    /// Execute each script once, drop the nodes, then run the hooks.
    fn replay(&self, scripts: &[BehaviorScript]) -> usize {
        let handles: Vec<ScriptHandle> = scripts.iter().map(|s| self.host.execute_script(s)).collect();
        for handle in &handles {
            self.host.remove_script(*handle);
        }
        for hook in &self.hooks {
            hook();
        }
        handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, CacheAgent};
    use crate::testing::{FakeNetwork, origin, url};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toolshell_core::CacheDb;

    fn tool_page(name: &str) -> String {
        format!(
            r#"<html><head><title>{name}</title></head>
            <body><nav><a href="/dashboard">Home</a></nav>
            <main><h1>{name}</h1><script src="/static/{name}.js"></script></main></body></html>"#
        )
    }

    fn config(policy: OverlapPolicy) -> NavigatorConfig {
        NavigatorConfig {
            origin: origin(),
            content_selector: "main".into(),
            excluded_paths: vec!["/logout".into()],
            settle_delay: Duration::from_millis(5),
            progress_clear_delay: Duration::from_millis(5),
            overlap_policy: policy,
        }
    }

    fn site() -> Arc<FakeNetwork> {
        let net = Arc::new(FakeNetwork::new());
        net.page("/dashboard", &tool_page("dashboard"));
        net.page("/tools/dice-roller", &tool_page("dice-roller"));
        net.page("/tools/notes", &tool_page("notes"));
        net
    }

    fn session(net: Arc<FakeNetwork>, policy: OverlapPolicy) -> Navigator<HeadlessPage> {
        let host = Arc::new(HeadlessPage::new());
        let dashboard = parse_page(&tool_page("dashboard"), "main").unwrap();
        host.load(&url("/dashboard"), &dashboard);

        let navigator = Navigator::new(host, net, config(policy)).unwrap();
        navigator.reset(&url("/dashboard"));
        navigator
    }

    #[test]
    fn test_rejects_invalid_selector() {
        let mut cfg = config(OverlapPolicy::LatestClick);
        cfg.content_selector = "main[[".into();
        let result = Navigator::new(Arc::new(HeadlessPage::new()), site(), cfg);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_config_from_app() {
        let app = AppConfig::default();
        let cfg = NavigatorConfig::from_app(&app).unwrap();
        assert_eq!(cfg.content_selector, "main");
        assert_eq!(cfg.settle_delay, Duration::from_millis(150));
        assert_eq!(cfg.overlap_policy, OverlapPolicy::LatestClick);
    }

    #[tokio::test]
    async fn test_click_from_scrolled_dashboard() {
        let nav = session(site(), OverlapPolicy::LatestClick);
        nav.host().set_scroll(400.0);

        let outcome = nav.click(&LinkTarget::new("/tools/dice-roller")).await;

        assert!(matches!(outcome, NavigationOutcome::Swapped { ref url, .. } if url.path() == "/tools/dice-roller"));
        let host = nav.host();
        assert_eq!(host.history(), vec![url("/dashboard"), url("/tools/dice-roller")]);
        assert!(host.content().contains("<h1>dice-roller</h1>"));
        assert_eq!(host.title(), "dice-roller");
        assert_eq!(host.scroll_offset(), 0.0);
        assert_eq!(host.progress_log(), vec![30, 70, 100, 0]);
        assert!(!host.is_transitioning());
        assert_eq!(nav.scroll_memory("/dashboard"), Some(400.0));
        assert_eq!(nav.current_path(), "/tools/dice-roller");
    }

    #[tokio::test]
    async fn test_back_restores_scroll_offset() {
        let nav = session(site(), OverlapPolicy::LatestClick);
        nav.host().set_scroll(250.0);
        nav.click(&LinkTarget::new("/tools/notes")).await;
        nav.host().set_scroll(80.0);

        let previous = nav.host().back().unwrap();
        let outcome = nav.traverse(previous).await;

        assert!(matches!(outcome, NavigationOutcome::Swapped { .. }));
        assert_eq!(nav.host().scroll_offset(), 250.0);
        assert_eq!(nav.host().scroll_log().last(), Some(&(250.0, ScrollBehavior::Smooth)));
        assert_eq!(nav.scroll_memory("/tools/notes"), Some(80.0));
        // Traversal does not grow history.
        assert_eq!(nav.host().history().len(), 2);
    }

    #[tokio::test]
    async fn test_revisit_by_click_restores_instantly() {
        let nav = session(site(), OverlapPolicy::LatestClick);
        nav.host().set_scroll(120.0);
        nav.click(&LinkTarget::new("/tools/notes")).await;
        nav.click(&LinkTarget::new("/dashboard")).await;

        assert_eq!(nav.host().scroll_log().last(), Some(&(120.0, ScrollBehavior::Instant)));
    }

    #[tokio::test]
    async fn test_passthrough_links() {
        let net = site();
        let nav = session(net.clone(), OverlapPolicy::LatestClick);

        assert_eq!(nav.click(&LinkTarget::new("/logout")).await, NavigationOutcome::Passthrough);
        assert_eq!(nav.click(&LinkTarget::new("https://github.com/")).await, NavigationOutcome::Passthrough);
        assert_eq!(nav.click(&LinkTarget::new("/tools/notes#top")).await, NavigationOutcome::Passthrough);
        assert!(net.calls().is_empty());
        assert_eq!(nav.host().history().len(), 1);
    }

    #[tokio::test]
    async fn test_rapid_clicks_latest_wins() {
        let net = site();
        net.route("/tools/notes", 200, &tool_page("notes"), Duration::from_millis(150));
        net.route("/tools/dice-roller", 200, &tool_page("dice-roller"), Duration::from_millis(10));
        let nav = session(net, OverlapPolicy::LatestClick);

        let notes = LinkTarget::new("/tools/notes");
        let dice = LinkTarget::new("/tools/dice-roller");
        let (slow, fast) = tokio::join!(nav.click(&notes), nav.click(&dice));

        assert_eq!(slow, NavigationOutcome::Superseded);
        assert!(matches!(fast, NavigationOutcome::Swapped { .. }));
        assert!(nav.host().content().contains("dice-roller"));
        assert_eq!(nav.current_path(), "/tools/dice-roller");
        assert_eq!(nav.host().location(), Some(url("/tools/dice-roller")));
        assert!(!nav.host().is_transitioning());
        assert_eq!(nav.host().progress_log().last(), Some(&0));
    }

    #[tokio::test]
    async fn test_superseded_target_leaves_no_scroll_memory() {
        let net = site();
        net.route("/tools/notes", 200, &tool_page("notes"), Duration::from_millis(150));
        net.route("/tools/dice-roller", 200, &tool_page("dice-roller"), Duration::from_millis(10));
        let nav = session(net.clone(), OverlapPolicy::LatestClick);
        nav.host().set_scroll(400.0);

        let notes = LinkTarget::new("/tools/notes");
        let dice = LinkTarget::new("/tools/dice-roller");
        tokio::join!(nav.click(&notes), nav.click(&dice));

        assert_eq!(nav.scroll_memory("/dashboard"), Some(400.0));
        assert_eq!(nav.scroll_memory("/tools/notes"), None);

        net.page("/tools/notes", &tool_page("notes"));
        nav.host().set_scroll(90.0);
        nav.click(&notes).await;
        assert_eq!(nav.host().scroll_offset(), 0.0);
        assert_eq!(nav.scroll_memory("/tools/dice-roller"), Some(90.0));
    }

    #[tokio::test]
    async fn test_current_path_moves_on_swap_only() {
        let net = site();
        net.set_offline(true);
        let nav = session(net, OverlapPolicy::LatestClick);

        nav.click(&LinkTarget::new("/tools/notes")).await;
        assert_eq!(nav.current_path(), "/dashboard");
    }

    #[tokio::test]
    async fn test_rapid_clicks_last_arrival() {
        let net = site();
        net.route("/tools/notes", 200, &tool_page("notes"), Duration::from_millis(150));
        net.route("/tools/dice-roller", 200, &tool_page("dice-roller"), Duration::from_millis(10));
        let nav = session(net, OverlapPolicy::LastArrival);

        let notes = LinkTarget::new("/tools/notes");
        let dice = LinkTarget::new("/tools/dice-roller");
        let (slow, fast) = tokio::join!(nav.click(&notes), nav.click(&dice));

        assert!(matches!(slow, NavigationOutcome::Swapped { .. }));
        assert!(matches!(fast, NavigationOutcome::Swapped { .. }));
        assert!(nav.host().content().contains("<h1>notes</h1>"));
        assert!(!nav.host().is_transitioning());
    }

    #[tokio::test]
    async fn test_fetch_failure_forces_full_load() {
        let net = site();
        net.set_offline(true);
        let nav = session(net, OverlapPolicy::LatestClick);

        let outcome = nav.click(&LinkTarget::new("/tools/notes")).await;

        assert_eq!(outcome, NavigationOutcome::HardReload(url("/tools/notes")));
        assert_eq!(nav.host().take_pending_navigation(), Some(url("/tools/notes")));
        assert!(nav.host().content().contains("<h1>dashboard</h1>"));
        assert!(!nav.host().is_transitioning());
    }

    #[tokio::test]
    async fn test_error_status_forces_full_load() {
        let net = site();
        net.route("/tools/broken", 500, "oops", Duration::ZERO);
        let nav = session(net, OverlapPolicy::LatestClick);

        let outcome = nav.click(&LinkTarget::new("/tools/broken")).await;
        assert_eq!(outcome, NavigationOutcome::HardReload(url("/tools/broken")));
    }

    #[tokio::test]
    async fn test_missing_region_forces_full_load() {
        let net = site();
        net.page("/tools/bare", "<html><body><p>no region here</p></body></html>");
        let nav = session(net, OverlapPolicy::LatestClick);

        let outcome = nav.click(&LinkTarget::new("/tools/bare")).await;
        assert_eq!(outcome, NavigationOutcome::HardReload(url("/tools/bare")));
        assert_eq!(nav.host().take_pending_navigation(), Some(url("/tools/bare")));
    }

    #[tokio::test]
    async fn test_scripts_replayed_once_then_removed() {
        let net = site();
        net.page(
            "/tools/morse-code",
            r#"<html><head><title>Morse</title></head><body><main>
                <script src="/static/morse.js" defer></script>
                <script>initMorse();</script>
            </main></body></html>"#,
        );
        let nav = session(net, OverlapPolicy::LatestClick);
        let before = nav.host().executed_scripts().len();

        let outcome = nav.click(&LinkTarget::new("/tools/morse-code")).await;

        assert!(matches!(outcome, NavigationOutcome::Swapped { scripts: 2, .. }));
        let executed = nav.host().executed_scripts();
        assert_eq!(executed.len() - before, 2);
        assert_eq!(executed[before].src(), Some("/static/morse.js"));
        assert_eq!(executed[before + 1].body, "initMorse();");
        assert_eq!(nav.host().live_script_count(), 0);
    }

    #[tokio::test]
    async fn test_reinit_hooks_run_after_each_swap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let nav = session(site(), OverlapPolicy::LatestClick).on_reinit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        nav.click(&LinkTarget::new("/tools/notes")).await;
        nav.click(&LinkTarget::new("/tools/dice-roller")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_scroll_memory() {
        let nav = session(site(), OverlapPolicy::LatestClick);
        nav.host().set_scroll(300.0);
        nav.click(&LinkTarget::new("/tools/notes")).await;
        assert!(nav.scroll_memory("/dashboard").is_some());

        nav.reset(&url("/tools/dice-roller"));
        assert_eq!(nav.scroll_memory("/dashboard"), None);
        assert_eq!(nav.current_path(), "/tools/dice-roller");
    }

    #[tokio::test]
    async fn test_navigates_offline_through_cache_agent() {
        let net = site();
        let store = CacheDb::open_in_memory().await.unwrap();
        let agent_config = AgentConfig {
            origin: origin(),
            generation: "v1".into(),
            offline_path: "/dashboard".into(),
            manifest: vec!["/dashboard".into(), "/tools/notes".into()],
            api_marker: "/api/".into(),
        };
        let agent = Arc::new(CacheAgent::new(store, net.clone(), agent_config));
        agent.start().await.unwrap();

        net.set_offline(true);
        let host = Arc::new(HeadlessPage::new());
        let nav = Navigator::new(host, agent.clone(), config(OverlapPolicy::LatestClick)).unwrap();
        nav.reset(&url("/dashboard"));

        let cached = nav.click(&LinkTarget::new("/tools/notes")).await;
        assert!(matches!(cached, NavigationOutcome::Swapped { .. }));
        assert!(nav.host().content().contains("<h1>notes</h1>"));

        let uncached = nav.click(&LinkTarget::new("/tools/dice-roller")).await;
        assert_eq!(uncached, NavigationOutcome::HardReload(url("/tools/dice-roller")));
        agent.flush().await;
    }
}
