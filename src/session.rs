// SPDX-License-Identifier: Apache-2.0
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::HttpRequest;

use crate::cookies::{ACCESS_COOKIE, ACTIVITY_COOKIE};

/// Current time as epoch milliseconds, matching the activity-cookie encoding.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Request-scoped view of the two session cookies. Nothing server-side backs
/// this; the client's cookie jar is the only session state that exists.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub last_activity_ms: Option<u64>,
}

impl SessionSnapshot {
    pub fn from_request(req: &HttpRequest) -> Self {
        let token = req
            .cookie(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        let last_activity_ms = req
            .cookie(ACTIVITY_COOKIE)
            .and_then(|c| c.value().parse::<u64>().ok());
        Self {
            token,
            last_activity_ms,
        }
    }

    /// Authentication is derived solely from the access cookie's presence;
    /// the token itself is validated by the upstream, not here.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// A session is idle-expired only when a numeric activity timestamp exists
    /// and more than `idle_ms` has passed since it. A missing or unreadable
    /// activity cookie counts as not expired; the session stays usable rather
    /// than locking the user out over a lost timestamp.
    pub fn idle_expired(&self, now_ms: u64, idle_ms: u64) -> bool {
        match self.last_activity_ms {
            Some(last) => now_ms.saturating_sub(last) > idle_ms,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const IDLE_MS: u64 = 1_800_000;

    #[test]
    fn snapshot_reads_both_cookies() {
        let req = TestRequest::default()
            .cookie(actix_web::cookie::Cookie::new(ACCESS_COOKIE, "tok"))
            .cookie(actix_web::cookie::Cookie::new(ACTIVITY_COOKIE, "12345"))
            .to_http_request();
        let snapshot = SessionSnapshot::from_request(&req);
        assert_eq!(snapshot.token.as_deref(), Some("tok"));
        assert_eq!(snapshot.last_activity_ms, Some(12345));
        assert!(snapshot.is_authenticated());
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let req = TestRequest::default()
            .cookie(actix_web::cookie::Cookie::new(ACCESS_COOKIE, ""))
            .to_http_request();
        assert!(!SessionSnapshot::from_request(&req).is_authenticated());
    }

    #[test]
    fn expired_when_past_the_idle_window() {
        let snapshot = SessionSnapshot {
            token: Some("tok".into()),
            last_activity_ms: Some(1_000),
        };
        assert!(snapshot.idle_expired(1_000 + IDLE_MS + 1, IDLE_MS));
        assert!(!snapshot.idle_expired(1_000 + IDLE_MS, IDLE_MS));
    }

    #[test]
    fn missing_or_non_numeric_timestamp_is_not_expired() {
        let req = TestRequest::default()
            .cookie(actix_web::cookie::Cookie::new(ACCESS_COOKIE, "tok"))
            .cookie(actix_web::cookie::Cookie::new(ACTIVITY_COOKIE, "not-a-number"))
            .to_http_request();
        let snapshot = SessionSnapshot::from_request(&req);
        assert_eq!(snapshot.last_activity_ms, None);
        assert!(!snapshot.idle_expired(u64::MAX, IDLE_MS));
    }

    #[test]
    fn clock_skew_does_not_underflow() {
        let snapshot = SessionSnapshot {
            token: Some("tok".into()),
            last_activity_ms: Some(u64::MAX),
        };
        assert!(!snapshot.idle_expired(0, IDLE_MS));
    }
}
