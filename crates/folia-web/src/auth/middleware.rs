use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use folia_core::Authorizer;

use crate::state::AppState;

/// The requesting party, as far as the bearer token says.
///
/// Extraction never rejects: an unauthenticated caller still reaches the
/// handler, and the library answers `unauthorized` through [`Authorizer`].
#[derive(Debug, Clone)]
pub struct Caller {
    /// Token subject, or `None` when no valid token was presented.
    pub sub: Option<String>,
}

impl Authorizer for Caller {
    fn is_authorized(&self) -> bool {
        self.sub.is_some()
    }
}

/// Returns the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // If no password is configured, skip auth (dev mode)
        if !state.config.has_auth() {
            return Ok(Caller {
                sub: Some("anonymous".to_string()),
            });
        }

        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Caller { sub: None });
        };

        let sub = match super::jwt::verify_token(&state.config.auth.jwt_secret, token) {
            Ok(claims) if state.revoked_tokens.contains_key(&claims.jti) => {
                tracing::debug!("Rejected revoked token for user: {}", claims.sub);
                None
            }
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                tracing::debug!("Rejected bearer token: {e}");
                None
            }
        };

        Ok(Caller { sub })
    }
}
