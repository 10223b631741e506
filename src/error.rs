// SPDX-License-Identifier: Apache-2.0
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the gateway. Every variant maps to a fixed HTTP status
/// and a JSON `{ "detail": ... }` body; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// BACKEND_URL was never configured. A developer mistake, not a user error.
    #[error("BACKEND_URL is not configured")]
    MissingUpstream,

    /// Network-level failure reaching the upstream API. The message comes from
    /// the outbound client and never contains credentials.
    #[error("upstream unreachable: {0}")]
    Upstream(String),

    /// Malformed request input (unparsable JSON, missing required field).
    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Too many attempts, retry later")]
    RateLimited,
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingUpstream => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(GatewayError::MissingUpstream.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(GatewayError::Upstream("refused".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(GatewayError::Validation("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::NotAuthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn upstream_message_is_safe_to_render() {
        let err = GatewayError::Upstream("connection refused".into());
        assert_eq!(err.to_string(), "upstream unreachable: connection refused");
    }
}
