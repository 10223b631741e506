// SPDX-License-Identifier: Apache-2.0
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Headers meaningful only for a single transport leg; a proxy must never
/// forward these verbatim (RFC 9110 §7.6.1).
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| name.as_str() == *h)
}

/// Clone the inbound headers into the set safe to forward upstream.
///
/// `host`, `accept-encoding`, `connection` and `content-length` are transport
/// concerns the outbound client must recompute itself; forwarding the original
/// `accept-encoding` in particular invites content-decoding mismatches once
/// the client transparently decompresses the upstream body.
pub fn forwardable_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if *name == header::HOST
            || *name == header::ACCEPT_ENCODING
            || *name == header::CONTENT_LENGTH
            || is_hop_by_hop(name)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Inject `Authorization: Bearer <token>` when a session token is present.
/// A token that cannot form a valid header value is skipped rather than
/// failing the whole request.
pub fn with_bearer(mut headers: HeaderMap, token: Option<&str>) -> HeaderMap {
    if let Some(token) = token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(header::AUTHORIZATION, value);
        }
    }
    headers
}

/// Remove hop-by-hop headers from an upstream response before re-emitting it.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_of(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn transport_headers_are_not_forwarded() {
        let headers = headers_of(&[
            ("host", "www.pont-facturx.com"),
            ("accept-encoding", "gzip, br"),
            ("connection", "keep-alive"),
            ("content-length", "42"),
            ("content-type", "application/json"),
            ("x-custom", "kept"),
        ]);
        let out = forwardable_request_headers(&headers);
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::ACCEPT_ENCODING).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(out.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn bearer_is_injected_only_when_present() {
        let out = with_bearer(HeaderMap::new(), Some("abc123"));
        assert_eq!(out.get(header::AUTHORIZATION).unwrap(), "Bearer abc123");

        let out = with_bearer(HeaderMap::new(), None);
        assert!(out.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn malformed_token_is_skipped() {
        let out = with_bearer(HeaderMap::new(), Some("bad\ntoken"));
        assert!(out.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn hop_by_hop_headers_are_stripped_from_responses() {
        let headers = headers_of(&[
            ("connection", "close"),
            ("keep-alive", "timeout=5"),
            ("proxy-authenticate", "Basic"),
            ("proxy-authorization", "Basic Zm9v"),
            ("te", "trailers"),
            ("trailer", "Expires"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "h2c"),
            ("content-type", "application/pdf"),
        ]);
        let out = strip_hop_by_hop(&headers);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    }
}
