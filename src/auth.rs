// SPDX-License-Identifier: Apache-2.0
use actix_web::{
    http::{header, StatusCode},
    web, HttpRequest, HttpResponse,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::config::GatewayConfig;
use crate::cookies::{
    access_cookie, activity_cookie, clear_session_cookies, CookieScope, ACCESS_COOKIE,
};
use crate::error::GatewayError;
use crate::proxy::{build_target_url, http_client};
use crate::rate_limit::RateLimiters;
use crate::session::now_epoch_ms;

const LOGIN_PATH: &str = "/v1/auth/login";
const SIGNUP_PATH: &str = "/v1/auth/signup";
const GOOGLE_PATH: &str = "/v1/auth/google";

/// Status and JSON body as returned by the upstream auth API. A non-JSON
/// upstream body is wrapped as `{ "detail": <raw text> }` instead of failing.
struct UpstreamReply {
    status: StatusCode,
    body: Value,
}

impl UpstreamReply {
    fn access_token(&self) -> Option<&str> {
        self.body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// POST a JSON payload to the upstream auth API and normalize the reply.
/// Exactly one attempt per client request; transient failures surface as 502
/// and are left to the browser to retry through normal user interaction.
async fn forward_auth(
    config: &GatewayConfig,
    path: &str,
    payload: web::Bytes,
) -> Result<UpstreamReply, GatewayError> {
    let base = config.upstream()?;
    let target = build_target_url(base, path, None);

    let client = http_client();
    let mut res = client
        .post(target.as_str())
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .send_body(payload)
        .await
        .map_err(|e| {
            error!(target = %target, error = %e, "Auth upstream unreachable");
            GatewayError::Upstream(e.to_string())
        })?;

    let status =
        StatusCode::from_u16(res.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = res.body().await.map_err(|e| {
        error!(target = %target, error = %e, "Failed reading auth upstream body");
        GatewayError::Upstream(e.to_string())
    })?;

    let body = serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| {
        json!({ "detail": String::from_utf8_lossy(&bytes).into_owned() })
    });

    Ok(UpstreamReply { status, body })
}

/// Pass the upstream status and body through; on success with an access token
/// in the body, establish the session by setting both cookies.
fn session_response(
    req: &HttpRequest,
    config: &GatewayConfig,
    reply: UpstreamReply,
) -> HttpResponse {
    let mut builder = HttpResponse::build(reply.status);

    if reply.status.is_success() {
        if let Some(token) = reply.access_token() {
            let host = req.connection_info().host().to_string();
            let scope = CookieScope::for_request(Some(&host), config);
            builder.cookie(access_cookie(token, &scope));
            builder.cookie(activity_cookie(now_epoch_ms(), &scope));
            debug!(host = %host, "Session cookies set");
        }
    }

    builder.json(reply.body)
}

fn check_rate_limit(req: &HttpRequest, limiters: &RateLimiters) -> Result<(), GatewayError> {
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    if limiters.login_limiter.check_ip(&ip) {
        Ok(())
    } else {
        Err(GatewayError::RateLimited)
    }
}

/// Credential exchange. The body passes to the upstream verbatim; the upstream
/// decides whether the credentials are valid.
#[instrument(skip_all)]
pub async fn login(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
    limiters: web::Data<RateLimiters>,
) -> Result<HttpResponse, GatewayError> {
    check_rate_limit(&req, &limiters)?;
    let reply = forward_auth(&config, LOGIN_PATH, body).await?;
    Ok(session_response(&req, &config, reply))
}

/// Account creation; cookie behavior identical to login.
#[instrument(skip_all)]
pub async fn signup(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
    limiters: web::Data<RateLimiters>,
) -> Result<HttpResponse, GatewayError> {
    check_rate_limit(&req, &limiters)?;
    let reply = forward_auth(&config, SIGNUP_PATH, body).await?;
    Ok(session_response(&req, &config, reply))
}

/// Google sign-in. Accepts `{ "credential": ... }` as sent by the Google
/// Identity Services popup, or `{ "id_token": ... }` directly; either way the
/// upstream receives `{ "id_token": ... }`.
#[instrument(skip_all)]
pub async fn google(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
    limiters: web::Data<RateLimiters>,
) -> Result<HttpResponse, GatewayError> {
    check_rate_limit(&req, &limiters)?;

    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|_| GatewayError::Validation("Invalid JSON body".into()))?;
    let id_token = parsed
        .get("credential")
        .or_else(|| parsed.get("id_token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Validation("Missing id_token".into()))?;

    let payload = web::Bytes::from(json!({ "id_token": id_token }).to_string());
    let reply = forward_auth(&config, GOOGLE_PATH, payload).await?;
    Ok(session_response(&req, &config, reply))
}

/// Idempotent logout: always succeeds and clears both session cookies under
/// every domain variant they may historically have been set with.
#[instrument(skip_all)]
pub async fn logout(
    req: HttpRequest,
    config: web::Data<GatewayConfig>,
) -> HttpResponse {
    let host = req.connection_info().host().to_string();
    let mut builder = HttpResponse::Ok();
    for cookie in clear_session_cookies(Some(&host), &config) {
        builder.cookie(cookie);
    }
    info!(host = %host, "Session cookies cleared");
    builder.json(json!({ "ok": true }))
}

/// Liveness ping from client-side idle detection: refreshes the rolling
/// activity timestamp without a full navigation.
#[instrument(skip_all)]
pub async fn ping(
    req: HttpRequest,
    config: web::Data<GatewayConfig>,
) -> Result<HttpResponse, GatewayError> {
    if req.cookie(ACCESS_COOKIE).is_none() {
        return Err(GatewayError::NotAuthenticated);
    }

    let host = req.connection_info().host().to_string();
    let scope = CookieScope::for_request(Some(&host), &config);
    let mut builder = HttpResponse::Ok();
    builder.cookie(activity_cookie(now_epoch_ms(), &scope));
    Ok(builder.json(json!({ "ok": true })))
}
