//! Link harvesting and the in-place interception rule.

use reqwest::Url;
use scraper::Html;
use std::collections::HashSet;

use super::document::selector;
use crate::fetch::{resolve, same_origin};

/// A link as the user would click it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkTarget {
    /// Raw href attribute
    pub href: String,
    /// `target` attribute, if any
    pub target: Option<String>,
    /// Whether the link carries a `download` attribute
    pub download: bool,
    /// Link text content
    pub text: String,
}

impl LinkTarget {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into(), ..Default::default() }
    }
}

/// What should happen when a link is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Swap the content in place.
    Intercept(Url),
    /// Let the platform perform its default action.
    Default,
}

/// Apply the interception rule.
///
/// A link is swapped in place only if it resolves to the same origin, opens in
/// the current browsing context, is not a download, carries no fragment and
/// does not point at an excluded path (logout).
pub fn classify(link: &LinkTarget, origin: &Url, excluded_paths: &[String]) -> LinkDecision {
    if link.download || link.href.contains('#') {
        return LinkDecision::Default;
    }
    if let Some(target) = link.target.as_deref()
        && !target.is_empty()
        && !target.eq_ignore_ascii_case("_self")
    {
        return LinkDecision::Default;
    }

    let url = match resolve(origin, &link.href) {
        Ok(u) => u,
        Err(_) => return LinkDecision::Default,
    };
    if !same_origin(&url, origin) || excluded_paths.iter().any(|p| p == url.path()) {
        return LinkDecision::Default;
    }

    LinkDecision::Intercept(url)
}

/// Harvest the links of an HTML fragment or document, deduplicated by href.
pub fn collect_links(html: &str) -> Vec<LinkTarget> {
    let Ok(anchor) = selector("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_fragment(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !seen.insert(href.to_string()) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
        let text = if text.is_empty() { "[link]".to_string() } else { text };

        links.push(LinkTarget {
            href: href.to_string(),
            target: element.value().attr("target").map(str::to_string),
            download: element.value().attr("download").is_some(),
            text,
        });
    }

    links
}
