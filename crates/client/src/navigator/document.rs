//! Parsing of fetched pages into swappable parts.

use scraper::{ElementRef, Html, Selector};
use toolshell_core::Error;

/// A script found inside swapped-in content, ready to be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorScript {
    /// Attributes in document order (`src`, `type`, `defer`, ...).
    pub attributes: Vec<(String, String)>,
    /// Inline body; empty for external scripts.
    pub body: String,
}

impl BehaviorScript {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attribute("src")
    }
}

/// The parts of a fetched document the navigator needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: Option<String>,
    /// Inner HTML of the content region, scripts included.
    pub content_html: String,
    pub scripts: Vec<BehaviorScript>,
}

pub(crate) fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("invalid selector {css:?}: {e:?}")))
}

/// Check a content-region selector without parsing a document.
pub fn validate_selector(css: &str) -> Result<(), Error> {
    selector(css).map(|_| ())
}

/// Extract the content region, title and behavior scripts of a document.
///
/// Fails with `CONTENT_MISSING` when no element matches `content_selector`.
pub fn parse_page(html: &str, content_selector: &str) -> Result<FetchedPage, Error> {
    let region_selector = selector(content_selector)?;
    let title_selector = selector("title")?;

    let document = Html::parse_document(html);

    let region = document
        .select(&region_selector)
        .next()
        .ok_or_else(|| Error::ContentMissing(format!("no element matches {content_selector:?}")))?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(FetchedPage { title, content_html: region.inner_html(), scripts: collect_scripts(region)? })
}

fn collect_scripts(region: ElementRef<'_>) -> Result<Vec<BehaviorScript>, Error> {
    let script_selector = selector("script")?;
    Ok(region
        .select(&script_selector)
        .map(|script| BehaviorScript {
            attributes: script
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: script.text().collect(),
        })
        .collect())
}
