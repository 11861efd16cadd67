//! URL helpers for consistent cache keys and origin checks.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for toolshell_core::Error {
    fn from(err: UrlError) -> Self {
        toolshell_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Reject anything but http(s)
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a path or href against the site origin and canonicalize it.
///
/// Absolute hrefs keep their own origin; the caller decides whether a foreign
/// origin is acceptable.
pub fn resolve(origin: &Url, href: &str) -> Result<Url, UrlError> {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    canonicalize(joined.as_str())
}

/// True when both URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://tools.example.com").unwrap()
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM/Tools").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Tools");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com/notes#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/notes");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?a=1&b=2").unwrap();
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_relative_rejected() {
        let result = canonicalize("/dashboard");
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_path() {
        let url = resolve(&origin(), "/tools/dice-roller").unwrap();
        assert_eq!(url.as_str(), "https://tools.example.com/tools/dice-roller");
    }

    #[test]
    fn test_resolve_keeps_foreign_origin() {
        let url = resolve(&origin(), "https://other.example.org/x").unwrap();
        assert_eq!(url.host_str(), Some("other.example.org"));
        assert!(!same_origin(&url, &origin()));
    }

    #[test]
    fn test_resolve_rejects_javascript_href() {
        let result = resolve(&origin(), "javascript:void(0)");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_same_origin_port_matters() {
        let a = Url::parse("http://127.0.0.1:5000/a").unwrap();
        let b = Url::parse("http://127.0.0.1:5001/a").unwrap();
        assert!(!same_origin(&a, &b));
        assert!(same_origin(&a, &Url::parse("http://127.0.0.1:5000/b").unwrap()));
    }
}
