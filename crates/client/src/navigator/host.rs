//! The page the navigator drives.
//!
//! [`PageHost`] is the seam between the navigator and a rendered document.
//! [`HeadlessPage`] is an in-memory document used by the server and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Url;

use super::document::{BehaviorScript, FetchedPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Identifies a replayed script node so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandle(pub u64);

/// Operations the navigator performs on the live document.
///
/// Implementations use interior mutability; every call happens on the
/// navigator's task and must not block.
pub trait PageHost: Send + Sync {
    /// Current vertical scroll offset in pixels.
    fn scroll_offset(&self) -> f64;
    fn scroll_to(&self, offset: f64, behavior: ScrollBehavior);
    /// Add a history entry without loading it.
    fn push_history(&self, url: &Url);
    /// Drive the loading indicator (0 hides it).
    fn set_progress(&self, percent: u8);
    /// Toggle the transition mark on the content region.
    fn set_transitioning(&self, transitioning: bool);
    /// Replace the inner HTML of the content region.
    fn replace_content(&self, html: &str);
    fn set_title(&self, title: &str);
    /// Materialize a fresh script node so it executes once.
    fn execute_script(&self, script: &BehaviorScript) -> ScriptHandle;
    fn remove_script(&self, handle: ScriptHandle);
    /// Abandon in-place navigation and load `url` for real.
    fn hard_navigate(&self, url: &Url);
}

/// Entries kept per log; older ones are dropped first.
const LOG_LIMIT: usize = 128;

fn record<T>(log: &mut Vec<T>, item: T) {
    if log.len() >= LOG_LIMIT {
        log.remove(0);
    }
    log.push(item);
}

#[derive(Debug, Default)]
struct PageState {
    location: Option<Url>,
    title: String,
    content: String,
    scroll_y: f64,
    scroll_log: Vec<(f64, ScrollBehavior)>,
    history: Vec<Url>,
    cursor: usize,
    progress_log: Vec<u8>,
    transitioning: bool,
    executed: Vec<BehaviorScript>,
    live_scripts: HashMap<ScriptHandle, BehaviorScript>,
    next_handle: u64,
    pending_navigation: Option<Url>,
}

/// In-memory page with a browser-like history stack.
#[derive(Debug, Default)]
pub struct HeadlessPage {
    state: Mutex<PageState>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Perform a full document load: fresh content, top of page, and a new
    /// history entry unless `url` is already current.
    pub fn load(&self, url: &Url, page: &FetchedPage) {
        let mut state = self.state();
        let cursor = state.cursor;
        match &state.location {
            // Reload of the current entry.
            Some(current) if current == url => {}
            Some(_) => {
                state.history.truncate(cursor + 1);
                state.history.push(url.clone());
                state.cursor = state.history.len() - 1;
            }
            None => {
                state.history = vec![url.clone()];
                state.cursor = 0;
            }
        }
        state.location = Some(url.clone());
        state.title = page.title.clone().unwrap_or_default();
        state.content = page.content_html.clone();
        state.scroll_y = 0.0;
        state.transitioning = false;
        state.progress_log.clear();
        state.scroll_log.clear();
        state.live_scripts.clear();
        state.executed = page.scripts.clone();
        state.pending_navigation = None;
    }

    /// Move one entry back in history. Returns the URL now current.
    pub fn back(&self) -> Option<Url> {
        let mut state = self.state();
        if state.cursor == 0 || state.history.is_empty() {
            return None;
        }
        state.cursor -= 1;
        let url = state.history[state.cursor].clone();
        state.location = Some(url.clone());
        Some(url)
    }

    /// Move one entry forward in history. Returns the URL now current.
    pub fn forward(&self) -> Option<Url> {
        let mut state = self.state();
        if state.cursor + 1 >= state.history.len() {
            return None;
        }
        state.cursor += 1;
        let url = state.history[state.cursor].clone();
        state.location = Some(url.clone());
        Some(url)
    }

    /// User scroll.
    pub fn set_scroll(&self, offset: f64) {
        self.state().scroll_y = offset;
    }

    pub fn location(&self) -> Option<Url> {
        self.state().location.clone()
    }

    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    pub fn content(&self) -> String {
        self.state().content.clone()
    }

    pub fn history(&self) -> Vec<Url> {
        self.state().history.clone()
    }

    pub fn progress_log(&self) -> Vec<u8> {
        self.state().progress_log.clone()
    }

    pub fn scroll_log(&self) -> Vec<(f64, ScrollBehavior)> {
        self.state().scroll_log.clone()
    }

    pub fn is_transitioning(&self) -> bool {
        self.state().transitioning
    }

    pub fn executed_scripts(&self) -> Vec<BehaviorScript> {
        self.state().executed.clone()
    }

    pub fn live_script_count(&self) -> usize {
        self.state().live_scripts.len()
    }

    /// Take the URL of a requested full navigation, if any.
    pub fn take_pending_navigation(&self) -> Option<Url> {
        self.state().pending_navigation.take()
    }
}

impl PageHost for HeadlessPage {
    fn scroll_offset(&self) -> f64 {
        self.state().scroll_y
    }

    fn scroll_to(&self, offset: f64, behavior: ScrollBehavior) {
        let mut state = self.state();
        state.scroll_y = offset;
        record(&mut state.scroll_log, (offset, behavior));
    }

    fn push_history(&self, url: &Url) {
        let mut state = self.state();
        let cursor = state.cursor;
        state.history.truncate(cursor + 1);
        state.history.push(url.clone());
        state.cursor = state.history.len() - 1;
        state.location = Some(url.clone());
    }

    fn set_progress(&self, percent: u8) {
        record(&mut self.state().progress_log, percent.min(100));
    }

    fn set_transitioning(&self, transitioning: bool) {
        self.state().transitioning = transitioning;
    }

    fn replace_content(&self, html: &str) {
        self.state().content = html.to_string();
    }

    fn set_title(&self, title: &str) {
        self.state().title = title.to_string();
    }

    fn execute_script(&self, script: &BehaviorScript) -> ScriptHandle {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = ScriptHandle(state.next_handle);
        record(&mut state.executed, script.clone());
        state.live_scripts.insert(handle, script.clone());
        handle
    }

    fn remove_script(&self, handle: ScriptHandle) {
        self.state().live_scripts.remove(&handle);
    }

    fn hard_navigate(&self, url: &Url) {
        self.state().pending_navigation = Some(url.clone());
    }
}
