//! Socket URL derivation
//!
//! The socket endpoint is derived from the page URL: `http` maps to `ws`,
//! `https` to `wss`, the endpoint is appended as a path segment and any
//! fragment is discarded. The query string survives.

use anyhow::{anyhow, Result};
use url::Url;

/// Derive the socket URL for a page. `ws_path` is the endpoint segment the
/// server mounts the socket on, usually `ws`.
pub fn socket_url(page_url: &Url, ws_path: &str) -> Result<Url> {
    let mut url = page_url.clone();

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => url.scheme(),
        other => return Err(anyhow!("cannot derive a socket URL from scheme '{other}'")),
    }
    .to_string();
    url.set_scheme(&scheme)
        .map_err(|_| anyhow!("cannot set scheme '{scheme}' on {page_url}"))?;

    url.path_segments_mut()
        .map_err(|_| anyhow!("page URL {page_url} cannot have a path"))?
        .pop_if_empty()
        .push(ws_path);

    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(page: &str) -> String {
        socket_url(&Url::parse(page).unwrap(), "ws").unwrap().to_string()
    }

    #[test]
    fn test_http_becomes_ws() {
        assert_eq!(derive("http://localhost:4000/"), "ws://localhost:4000/ws");
    }

    #[test]
    fn test_https_becomes_wss() {
        assert_eq!(derive("https://app.example.com/"), "wss://app.example.com/ws");
    }

    #[test]
    fn test_path_segment_appended() {
        assert_eq!(
            derive("http://localhost:4000/admin/panel"),
            "ws://localhost:4000/admin/panel/ws"
        );
        // A trailing slash does not produce an empty segment.
        assert_eq!(
            derive("http://localhost:4000/admin/"),
            "ws://localhost:4000/admin/ws"
        );
    }

    #[test]
    fn test_fragment_dropped_query_kept() {
        assert_eq!(
            derive("http://localhost:4000/app?tab=2#section"),
            "ws://localhost:4000/app/ws?tab=2"
        );
    }

    #[test]
    fn test_custom_endpoint_segment() {
        let url = socket_url(&Url::parse("http://h/").unwrap(), "socket").unwrap();
        assert_eq!(url.as_str(), "ws://h/socket");
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(socket_url(&Url::parse("file:///page.html").unwrap(), "ws").is_err());
    }
}
