// SPDX-License-Identifier: Apache-2.0
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderName, HeaderValue},
    web, Error, HttpResponse,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use serde_json::json;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::{debug, info, warn, Instrument};

use crate::config::GatewayConfig;
use crate::cookies::{activity_cookie, clear_session_cookies, CookieScope};
use crate::proxy::PROXY_PREFIX;
use crate::session::{now_epoch_ms, SessionSnapshot};

/// Pages that exist only behind authentication and must stay out of search
/// indexes
const PROTECTED_PAGES: [&str; 8] = [
    "/auth",
    "/billing",
    "/dashboard",
    "/profile",
    "/results",
    "/upload",
    "/verify",
    "/success",
];

const COOP: &str = "same-origin-allow-popups";
const COEP: &str = "unsafe-none";

fn is_static_asset(path: &str) -> bool {
    path.starts_with("/static/")
        || path.starts_with("/assets/")
        || path.starts_with("/icon")
        || path.starts_with("/apple-icon")
        || path == "/favicon.ico"
        || path == "/robots.txt"
        || path == "/sitemap.xml"
}

fn is_public_page(path: &str) -> bool {
    path == "/" || path == "/index.html"
}

fn is_api_path(path: &str) -> bool {
    path.starts_with(PROXY_PREFIX)
}

fn is_protected_page(path: &str) -> bool {
    PROTECTED_PAGES.iter().any(|page| path.starts_with(page))
}

/// Fixed header mutations applied to every response that leaves the gateway.
/// COOP must allow popups so the Google/Stripe popup windows can talk back via
/// postMessage; COEP stays off to avoid accidental cross-origin isolation.
fn decorate_response<B>(res: &mut ServiceResponse<B>, path: &str) {
    let headers = res.headers_mut();
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static(COOP),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static(COEP),
    );
    if is_protected_page(path) {
        headers.insert(
            HeaderName::from_static("x-robots-tag"),
            HeaderValue::from_static("noindex, nofollow"),
        );
    }
}

/// Request gate run ahead of every page and route handler: authentication,
/// rolling idle-timeout and response header policy in one place.
pub struct SessionGate;

impl SessionGate {
    pub fn new() -> Self {
        SessionGate
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionGateService {
            service: Rc::new(service),
        })
    }
}

pub struct SessionGateService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    // The span is built by hand and attached to the returned future;
    // #[instrument] cannot be used on a fn that moves `req` before returning
    // a boxed async block
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_owned();
        let span =
            tracing::info_span!("session_gate", path = %path, method = %req.method());
        let service = Rc::clone(&self.service);

        // Static assets bypass the session checks entirely
        if is_static_asset(&path) {
            let fut = service.call(req);
            return Box::pin(
                async move {
                    let mut res = fut.await?;
                    decorate_response(&mut res, &path);
                    Ok(res.map_into_left_body())
                }
                .instrument(span),
            );
        }

        // The auth handlers manage their own cookies; the gate must never
        // race them with refreshes or clears
        if path.starts_with("/auth") {
            span.in_scope(|| debug!("Auth-exempt path: {}", path));
            let fut = service.call(req);
            return Box::pin(
                async move {
                    let mut res = fut.await?;
                    decorate_response(&mut res, &path);
                    Ok(res.map_into_left_body())
                }
                .instrument(span),
            );
        }

        let config = match req.app_data::<web::Data<GatewayConfig>>() {
            Some(config) => config.get_ref().clone(),
            None => {
                // Misconfigured app wiring; fail closed rather than open
                span.in_scope(|| warn!("SessionGate running without GatewayConfig app data"));
                let (request, _) = req.into_parts();
                let response = HttpResponse::InternalServerError()
                    .json(json!({ "detail": "Gateway misconfigured" }));
                let mut res = ServiceResponse::new(request, response);
                decorate_response(&mut res, &path);
                return Box::pin(async move { Ok(res.map_into_right_body()) }.instrument(span));
            }
        };

        let snapshot = SessionSnapshot::from_request(req.request());
        let host = req.connection_info().host().to_string();
        let now = now_epoch_ms();

        if !snapshot.is_authenticated() {
            if is_public_page(&path) {
                let fut = service.call(req);
                return Box::pin(
                    async move {
                        let mut res = fut.await?;
                        decorate_response(&mut res, &path);
                        Ok(res.map_into_left_body())
                    }
                    .instrument(span),
                );
            }

            span.in_scope(|| debug!("Unauthenticated access attempt to {}", path));
            let (request, _) = req.into_parts();
            let response = if is_api_path(&path) {
                HttpResponse::Unauthorized().json(json!({ "detail": "Not authenticated" }))
            } else {
                // Query string deliberately dropped from the redirect
                HttpResponse::Found()
                    .insert_header((header::LOCATION, "/"))
                    .finish()
            };
            let mut res = ServiceResponse::new(request, response);
            decorate_response(&mut res, &path);
            return Box::pin(async move { Ok(res.map_into_right_body()) }.instrument(span));
        }

        if snapshot.idle_expired(now, config.idle_timeout_ms) {
            span.in_scope(|| info!("Idle session expired, forcing re-authentication"));
            let (request, _) = req.into_parts();
            let mut response = if is_api_path(&path) {
                HttpResponse::Unauthorized().json(json!({ "detail": "Session expired" }))
            } else {
                HttpResponse::Found()
                    .insert_header((header::LOCATION, "/"))
                    .finish()
            };
            for cookie in clear_session_cookies(Some(&host), &config) {
                if let Err(e) = response.add_cookie(&cookie) {
                    warn!("Failed to add removal cookie: {}", e);
                }
            }
            let mut res = ServiceResponse::new(request, response);
            decorate_response(&mut res, &path);
            return Box::pin(async move { Ok(res.map_into_right_body()) }.instrument(span));
        }

        // Active session: slide the idle window forward and pass through
        let scope = CookieScope::for_request(Some(&host), &config);
        let refreshed = activity_cookie(now, &scope);
        let fut = service.call(req);
        Box::pin(
            async move {
                let mut res = fut.await?;
                if let Err(e) = res.response_mut().add_cookie(&refreshed) {
                    warn!("Failed to refresh activity cookie: {}", e);
                }
                decorate_response(&mut res, &path);
                Ok(res.map_into_left_body())
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_prefixes_cover_the_asset_surface() {
        assert!(is_static_asset("/static/app.css"));
        assert!(is_static_asset("/assets/logo.svg"));
        assert!(is_static_asset("/favicon.ico"));
        assert!(is_static_asset("/robots.txt"));
        assert!(is_static_asset("/sitemap.xml"));
        assert!(is_static_asset("/icon-192.png"));
        assert!(is_static_asset("/apple-icon.png"));
        assert!(!is_static_asset("/dashboard"));
    }

    #[test]
    fn only_the_landing_page_is_public() {
        assert!(is_public_page("/"));
        assert!(is_public_page("/index.html"));
        assert!(!is_public_page("/dashboard"));
        assert!(!is_public_page("/proxy/v1/invoices"));
    }

    #[test]
    fn protected_pages_cover_prefix_variants() {
        assert!(is_protected_page("/verify"));
        assert!(is_protected_page("/verify-code"));
        assert!(is_protected_page("/dashboard"));
        assert!(!is_protected_page("/"));
    }
}
