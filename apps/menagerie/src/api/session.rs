//! # Session Guard
//!
//! Cookie-backed sessions and the per-request route check.
//!
//! The guard resolves the session cookie once, decides the path against the
//! route rules, and either redirects or hands the resolved user to the
//! handler through request extensions. Handlers pick it up with the
//! [`CurrentUser`] extractor.

use super::AppState;
use crate::error::AppError;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use menagerie_core::{RouteDecision, Timestamp, User, authorize_route};
use tracing::warn;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "menagerie_session";

/// The signed-in user, inserted by [`guard`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| Redirect::to("/login"))
    }
}

/// Session token from the `Cookie` header, if any.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value starting a session.
#[must_use]
pub fn session_cookie(token: &str, ttl_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={ttl_secs}")
}

/// `Set-Cookie` value removing the session cookie.
#[must_use]
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Route guard. Runs before every handler, the 404 fallback included.
pub async fn guard(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = session_token(request.headers());
    let active = match &token {
        Some(token) => match state.store.resolve_session(token, Timestamp::now()) {
            Ok(active) => active,
            Err(err) => return AppError::from(err).into_response(),
        },
        None => None,
    };

    let path = request.uri().path().to_string();
    let decision = authorize_route(&path, active.as_ref().map(|a| a.user.role));
    let stale_cookie = token.is_some() && active.is_none();

    let mut response = if let Some(location) = decision.location() {
        if decision == RouteDecision::Forbidden {
            warn!(
                path = %path,
                user = active.as_ref().map_or(0, |a| a.user.id.0),
                "route denied"
            );
        }
        Redirect::to(location).into_response()
    } else {
        if let Some(active) = active {
            request.extensions_mut().insert(CurrentUser(active.user));
        }
        next.run(request).await
    };

    if stale_cookie {
        if let Ok(value) = HeaderValue::from_str(&clear_cookie()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; menagerie_session=abc123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_cookie_is_no_session() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("menagerie_session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok", 60);
        assert!(cookie.starts_with("menagerie_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(clear_cookie().contains("Max-Age=0"));
    }
}
