//! HTTP request handlers.

mod send;
mod status;

pub use send::{send, send_buttons, send_list, send_media};
pub use status::status;

use axum::http::HeaderMap;

/// Header carrying the API token when it is not in the request body.
pub const TOKEN_HEADER: &str = "x-api-token";

/// The token supplied with a request: body field first, then header.
fn supplied_token<'a>(headers: &'a HeaderMap, body_token: Option<&'a str>) -> Option<&'a str> {
    body_token.or_else(|| headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()))
}

/// Exact string equality against the configured secret. An empty supplied
/// token never matches.
pub(crate) fn token_matches(
    headers: &HeaderMap,
    body_token: Option<&str>,
    expected: &str,
) -> bool {
    supplied_token(headers, body_token).is_some_and(|t| !t.is_empty() && t == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn body_token_beats_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(
            supplied_token(&headers, Some("from-body")),
            Some("from-body")
        );
    }

    #[test]
    fn header_token_used_when_body_has_none() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("secret"));
        assert!(token_matches(&headers, None, "secret"));
    }

    #[test]
    fn missing_token_never_matches() {
        let headers = HeaderMap::new();
        assert!(!token_matches(&headers, None, "secret"));
        assert!(!token_matches(&headers, None, ""));
    }

    #[test]
    fn mismatching_token_rejected() {
        let headers = HeaderMap::new();
        assert!(!token_matches(&headers, Some("wrong"), "secret"));
    }
}
