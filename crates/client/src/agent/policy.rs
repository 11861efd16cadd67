//! Storage policy for intercepted responses.

use reqwest::{Method, StatusCode, Url};

use crate::fetch::{CapturedResponse, Request};

/// True when the request path carries the API marker.
///
/// Such requests are read-through only: they are answered from the network
/// or an existing entry but never written.
pub fn is_dynamic(url: &Url, api_marker: &str) -> bool {
    url.path().contains(api_marker)
}

/// Decide whether a network response may be persisted.
///
/// Only a `200` answer to a same-origin `GET` outside the API namespace is
/// stored. Mutating methods, redirects off-site, partial content and errors
/// are passed through untouched.
pub fn should_store(request: &Request, response: &CapturedResponse, origin: &Url, api_marker: &str) -> bool {
    request.method == Method::GET
        && response.status == StatusCode::OK
        && response.is_same_origin(origin)
        && !is_dynamic(&request.url, api_marker)
}
