// SPDX-License-Identifier: Apache-2.0
use std::time::{Duration, Instant};

use actix_web::{
    http::{header, Method, StatusCode},
    web, HttpRequest, HttpResponse,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::cookies::ACCESS_COOKIE;
use crate::error::GatewayError;
use crate::headers::{forwardable_request_headers, strip_hop_by_hop, with_bearer};
use crate::session::now_epoch_ms;

/// Path prefix under which arbitrary API calls are forwarded upstream
pub const PROXY_PREFIX: &str = "/proxy";

/// Marker header identifying which gateway build produced a proxied response
pub const VERSION_HEADER: &str = "x-pontgate-version";
/// Synthetic per-request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Upstream error bodies are logged truncated to this many bytes
const ERROR_BODY_LOG_LIMIT: usize = 512;
// Proxied bodies are buffered; invoices and generated PDFs stay well under this
const BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Outbound client used for a single forwarded call. Built fresh per request;
/// the gateway keeps no connection pool of its own.
pub fn http_client() -> awc::Client {
    let connector = awc::Connector::new()
        .timeout(Duration::from_secs(10))
        .conn_keep_alive(Duration::from_secs(15))
        .disconnect_timeout(Duration::from_secs(2));

    awc::ClientBuilder::new()
        .timeout(Duration::from_secs(600))
        .connector(connector)
        .finish()
}

/// Synthetic request ID: epoch millis plus a short random suffix, enough to
/// correlate a proxied call across gateway and upstream logs.
pub fn request_id() -> String {
    format!("{}-{:06x}", now_epoch_ms(), rand::random::<u32>() & 0xff_ffff)
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Compute the upstream target URL for a forwarded sub-path.
///
/// The base has any trailing slash stripped and a sub-path of `/` is treated
/// as empty. When the base already ends in a versioned segment (`/v1`) and the
/// sub-path starts with the same segment, the duplicate is collapsed so the
/// target carries the segment exactly once. The query string passes through
/// unchanged.
pub fn build_target_url(base: &str, sub_path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let mut sub = if sub_path == "/" { "" } else { sub_path };

    // Only look at path segments, never at the authority
    if let Some(authority_end) = base.find("://").map(|i| i + 3) {
        if let Some(path_start) = base[authority_end..].find('/') {
            let base_path = &base[authority_end + path_start..];
            if let Some(last) = base_path.rsplit('/').next() {
                if is_version_segment(last) {
                    let dup = format!("/{last}");
                    if sub == dup {
                        sub = "";
                    } else if sub.starts_with(&format!("{dup}/")) {
                        sub = &sub[dup.len()..];
                    }
                }
            }
        }
    }

    let query = query.map_or_else(String::new, |q| format!("?{q}"));
    format!("{base}{sub}{query}")
}

/// Forward a request under `/proxy` to the upstream API.
///
/// Transport headers are recomputed rather than forwarded, the bearer token is
/// injected from the access cookie, and the response body is always re-emitted
/// as decoded bytes with `content-encoding: identity`; the outbound client has
/// already transparently decompressed it, and forwarding the original encoding
/// header over decoded bytes breaks client-side decoding.
#[instrument(skip(req, body, config), fields(method = %req.method(), path = %req.uri().path()))]
pub async fn proxy_request(
    req: HttpRequest,
    body: web::Bytes,
    config: &GatewayConfig,
) -> Result<HttpResponse, GatewayError> {
    let base = config.upstream()?;

    let original_path = req.uri().path();
    let sub_path = original_path
        .strip_prefix(PROXY_PREFIX)
        .unwrap_or(original_path);
    let target = build_target_url(base, sub_path, req.uri().query());

    let id = request_id();
    let token = req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string());
    debug!(
        request_id = %id,
        target = %target,
        has_token = token.is_some(),
        "Proxying request"
    );

    let client = http_client();
    let mut forwarded_req = client.request(req.method().clone(), target.as_str());
    let outbound = with_bearer(forwardable_request_headers(req.headers()), token.as_deref());
    for (name, value) in outbound.iter() {
        forwarded_req = forwarded_req.append_header((name.clone(), value.clone()));
    }

    let started = Instant::now();
    let send = match *req.method() {
        Method::GET | Method::HEAD => forwarded_req.send(),
        _ => forwarded_req.send_body(body),
    };

    let mut upstream_res = send.await.map_err(|e| {
        error!(request_id = %id, target = %target, error = %e, "Upstream unreachable");
        GatewayError::Upstream(e.to_string())
    })?;

    let status = upstream_res.status();
    let body_bytes = upstream_res.body().limit(BODY_LIMIT).await.map_err(|e| {
        error!(request_id = %id, target = %target, error = %e, "Failed reading upstream body");
        GatewayError::Upstream(e.to_string())
    })?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.as_u16() >= 400 {
        let truncated = String::from_utf8_lossy(
            &body_bytes[..body_bytes.len().min(ERROR_BODY_LOG_LIMIT)],
        )
        .into_owned();
        warn!(
            request_id = %id,
            target = %target,
            status = %status,
            elapsed_ms,
            body = %truncated,
            "Upstream returned an error"
        );
    } else {
        info!(request_id = %id, target = %target, status = %status, elapsed_ms, "Proxied");
    }

    let mut client_res = HttpResponse::build(
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
    );
    // append, not insert: repeated names (Set-Cookie, Vary) must all survive
    for (name, value) in strip_hop_by_hop(upstream_res.headers()).iter() {
        if *name == header::CONTENT_ENCODING || *name == header::CONTENT_LENGTH {
            continue;
        }
        client_res.append_header((name.clone(), value.clone()));
    }
    // The body below is the already-decoded bytes; say so explicitly
    client_res.insert_header((header::CONTENT_ENCODING, "identity"));
    client_res.insert_header((header::CACHE_CONTROL, "no-store"));
    client_res.insert_header((VERSION_HEADER, env!("CARGO_PKG_VERSION")));
    client_res.insert_header((REQUEST_ID_HEADER, id));

    Ok(client_res.body(body_bytes))
}

/// Route entry point for `/proxy/{tail}`, any method.
pub async fn proxy_entry(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
) -> Result<HttpResponse, GatewayError> {
    proxy_request(req, body, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://api.internal:8000";

    #[test]
    fn sub_path_is_appended_to_the_base() {
        assert_eq!(
            build_target_url(BASE, "/billing/credits", None),
            "http://api.internal:8000/billing/credits"
        );
    }

    #[test]
    fn trailing_slash_and_root_sub_path_normalize_away() {
        assert_eq!(
            build_target_url("http://api.internal:8000/", "/", None),
            "http://api.internal:8000"
        );
    }

    #[test]
    fn query_string_is_preserved_unchanged() {
        assert_eq!(
            build_target_url(BASE, "/v1/invoices", Some("page=2&size=50")),
            "http://api.internal:8000/v1/invoices?page=2&size=50"
        );
    }

    #[test]
    fn duplicated_version_segment_collapses() {
        assert_eq!(
            build_target_url("http://api.internal:8000/v1", "/v1/foo", None),
            "http://api.internal:8000/v1/foo"
        );
        assert_eq!(
            build_target_url("http://api.internal:8000/v1/", "/v1", None),
            "http://api.internal:8000/v1"
        );
    }

    #[test]
    fn non_version_segments_never_collapse() {
        assert_eq!(
            build_target_url("http://api.internal:8000/api", "/api/foo", None),
            "http://api.internal:8000/api/api/foo"
        );
        // A hostname that happens to look like a version is left alone
        assert_eq!(
            build_target_url("http://v1", "/v1/foo", None),
            "http://v1/v1/foo"
        );
    }

    #[test]
    fn version_prefix_must_match_a_whole_segment() {
        assert_eq!(
            build_target_url("http://api.internal:8000/v1", "/v12/foo", None),
            "http://api.internal:8000/v1/v12/foo"
        );
    }

    #[test]
    fn request_ids_carry_a_random_suffix() {
        let a = request_id();
        let b = request_id();
        assert!(a.contains('-'));
        assert_ne!(a, b);
    }
}
