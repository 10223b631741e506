// SPDX-License-Identifier: Apache-2.0
use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::config::GatewayConfig;

/// HTTP-only cookie carrying the opaque bearer token issued by the upstream
pub const ACCESS_COOKIE: &str = "pfxt_token";
/// HTTP-only cookie carrying the last-activity epoch-millisecond timestamp
pub const ACTIVITY_COOKIE: &str = "pfxt_last";

/// Resolve the cookie `Domain` attribute for a request hostname.
///
/// Strips any `:port` suffix and lowercases; returns the apex with a leading
/// dot when the host is the apex itself or one of its subdomains, so that
/// cookies set on the apex are shared with `www`. Anything else (including
/// empty or malformed input) means a host-only cookie.
pub fn cookie_domain_for_host(hostname: Option<&str>, apex: &str) -> Option<String> {
    let host = hostname
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    if host == apex || host.ends_with(&format!(".{apex}")) {
        return Some(format!(".{apex}"));
    }

    None
}

/// Per-request cookie attributes derived from the hostname and environment.
/// In non-production deployments the domain is always unset and `Secure` is
/// off; in production the domain is set only for the canonical apex and its
/// subdomains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieScope {
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieScope {
    pub fn for_request(hostname: Option<&str>, config: &GatewayConfig) -> Self {
        let domain = if config.production {
            cookie_domain_for_host(hostname, &config.apex_domain)
        } else {
            None
        };
        Self {
            domain,
            secure: config.production,
        }
    }
}

fn base_cookie(name: &'static str, value: String, scope: &CookieScope) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(scope.secure);
    cookie.set_path("/");
    if let Some(domain) = &scope.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// The access cookie carrying the upstream-issued bearer token.
pub fn access_cookie(token: &str, scope: &CookieScope) -> Cookie<'static> {
    base_cookie(ACCESS_COOKIE, token.to_string(), scope)
}

/// The activity cookie carrying the current epoch-millisecond timestamp.
pub fn activity_cookie(now_ms: u64, scope: &CookieScope) -> Cookie<'static> {
    base_cookie(ACTIVITY_COOKIE, now_ms.to_string(), scope)
}

/// Removal cookies for both session cookies, covering host-only, explicit
/// apex-domain and explicit current-hostname variants. Clearing all three
/// guarantees removal regardless of how the cookie was originally scoped;
/// historical deployments set them inconsistently. Domain'd variants only
/// apply in production, since cookies are never domain-scoped elsewhere.
pub fn clear_session_cookies(
    hostname: Option<&str>,
    config: &GatewayConfig,
) -> Vec<Cookie<'static>> {
    let mut domains: Vec<Option<String>> = vec![None];
    if config.production {
        if let Some(apex) = cookie_domain_for_host(hostname, &config.apex_domain) {
            domains.push(Some(apex));
        }
        let bare = hostname
            .unwrap_or("")
            .split(':')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if !bare.is_empty() && !domains.iter().flatten().any(|d| *d == bare) {
            domains.push(Some(bare));
        }
    }

    let mut cookies = Vec::with_capacity(domains.len() * 2);
    for domain in &domains {
        for name in [ACCESS_COOKIE, ACTIVITY_COOKIE] {
            let mut cookie = Cookie::new(name, "");
            cookie.set_http_only(true);
            cookie.set_path("/");
            cookie.set_max_age(Duration::ZERO);
            if let Some(domain) = domain {
                cookie.set_domain(domain.clone());
            }
            cookies.push(cookie);
        }
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    const APEX: &str = "pont-facturx.com";

    fn prod_config() -> GatewayConfig {
        GatewayConfig {
            production: true,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn apex_host_maps_to_dotted_apex() {
        assert_eq!(
            cookie_domain_for_host(Some("pont-facturx.com"), APEX),
            Some(".pont-facturx.com".to_string())
        );
    }

    #[test]
    fn subdomain_maps_to_dotted_apex() {
        assert_eq!(
            cookie_domain_for_host(Some("www.pont-facturx.com"), APEX),
            Some(".pont-facturx.com".to_string())
        );
    }

    #[test]
    fn port_is_stripped_and_case_ignored() {
        assert_eq!(
            cookie_domain_for_host(Some("WWW.Pont-Facturx.COM:443"), APEX),
            Some(".pont-facturx.com".to_string())
        );
    }

    #[test]
    fn unrelated_hosts_get_host_only_cookies() {
        assert_eq!(cookie_domain_for_host(Some("localhost:3000"), APEX), None);
        assert_eq!(cookie_domain_for_host(Some("evil-pont-facturx.com"), APEX), None);
        assert_eq!(cookie_domain_for_host(Some(""), APEX), None);
        assert_eq!(cookie_domain_for_host(None, APEX), None);
    }

    #[test]
    fn scope_never_sets_domain_outside_production() {
        let config = GatewayConfig::default();
        let scope = CookieScope::for_request(Some("pont-facturx.com"), &config);
        assert_eq!(scope.domain, None);
        assert!(!scope.secure);
    }

    #[test]
    fn scope_sets_domain_and_secure_in_production() {
        let scope = CookieScope::for_request(Some("www.pont-facturx.com"), &prod_config());
        assert_eq!(scope.domain, Some(".pont-facturx.com".to_string()));
        assert!(scope.secure);
    }

    #[test]
    fn session_cookies_are_http_only_lax() {
        let scope = CookieScope::for_request(Some("localhost"), &GatewayConfig::default());
        let cookie = access_cookie("abc", &scope);
        assert_eq!(cookie.name(), ACCESS_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn clearing_covers_three_domain_variants_in_production() {
        let cookies = clear_session_cookies(Some("www.pont-facturx.com"), &prod_config());
        // host-only, .apex, bare hostname; two cookie names each
        assert_eq!(cookies.len(), 6);
        assert!(cookies.iter().all(|c| c.max_age() == Some(Duration::ZERO)));
        let domains: Vec<Option<&str>> = cookies.iter().map(|c| c.domain()).collect();
        assert!(domains.contains(&None));
        assert!(domains.contains(&Some(".pont-facturx.com")));
        assert!(domains.contains(&Some("www.pont-facturx.com")));
    }

    #[test]
    fn clearing_is_host_only_outside_production() {
        let cookies = clear_session_cookies(Some("localhost:3000"), &GatewayConfig::default());
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.domain().is_none()));
    }
}
