//! Authentication middleware
//!
//! Protects routes that require a session.

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use super::session::{SessionClaims, SessionIssuer, TokenKind};
use crate::AppState;
use crate::chain::{BoxHandler, Middleware, middleware_fn, run};
use crate::error::AppError;

/// Read the access token from `Authorization: Bearer` or the access cookie.
fn extract_token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(cookie_name).map(|cookie| cookie.value().to_owned())
        })
}

fn authenticate(headers: &HeaderMap, sessions: &SessionIssuer) -> Result<SessionClaims, AppError> {
    let token = extract_token_from_headers(headers, sessions.cookie_name(TokenKind::Access))
        .ok_or(AppError::Unauthorized)?;

    sessions
        .verify(TokenKind::Access, &token)
        .map_err(|error| {
            tracing::debug!(%error, "Rejected access token");
            AppError::Unauthorized
        })
}

/// Middleware to require a valid access token
///
/// Adds the verified [`SessionClaims`] to request extensions, or answers
/// 401 without calling the rest of the chain.
///
/// # Usage
/// ```ignore
/// let authenticated = base.with(require_session(state.sessions.clone()));
/// router.route_service("/me", authenticated.then(get(me).with_state(state)));
/// ```
pub fn require_session(sessions: Arc<SessionIssuer>) -> Middleware {
    middleware_fn(move |mut request: Request<Body>, next: BoxHandler| {
        let sessions = sessions.clone();
        async move {
            let claims = match authenticate(request.headers(), &sessions) {
                Ok(claims) => claims,
                Err(error) => return error.into_response(),
            };

            request.extensions_mut().insert(claims);
            run(next, request).await
        }
    })
}

/// Extractor for the current session
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(claims): CurrentUser) -> impl IntoResponse {
///     format!("Hello, user {}", claims.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    /// Reuses claims left by [`require_session`], otherwise verifies the
    /// request itself.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<SessionClaims>().cloned() {
            return Ok(CurrentUser(claims));
        }

        let state = AppState::from_ref(state);
        let claims = authenticate(&parts.headers, &state.sessions)?;
        parts.extensions.insert(claims.clone());

        Ok(CurrentUser(claims))
    }
}
