//! Discord OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Discord.

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;

use super::middleware::{CurrentUser, require_session};
use super::state::{STATE_COOKIE_NAME, generate_state, state_cookie};
use crate::AppState;
use crate::chain::Chain;
use crate::data::User;
use crate::error::AppError;

/// Body sent once both session cookies are set
pub const LOGIN_SUCCESS_BODY: &str = "Access and refresh cookies set successfully";

/// Create authentication router
///
/// Routes:
/// - GET /discord - Redirect to Discord
/// - GET /redirect - OAuth callback
/// - GET /me - Current user (requires access token)
/// - POST /logout - Clear session cookies
///
/// Every route runs behind `chain`; `/me` additionally requires a session.
pub fn auth_router(state: &AppState, chain: &Chain) -> Router<AppState> {
    let authenticated = chain.with(require_session(state.sessions.clone()));

    Router::new()
        .route_service("/discord", chain.then(bind(get(discord), state)))
        .route_service("/redirect", chain.then(bind(get(redirect), state)))
        .route_service("/logout", chain.then(bind(post(logout), state)))
        .route_service("/me", authenticated.then(bind(get(me), state)))
}

/// Provide the state up front so the route can be wrapped by a chain.
fn bind(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter {
    route.with_state(state.clone())
}

// =============================================================================
// Login start
// =============================================================================

/// GET /discord
///
/// Sets a fresh `oauth_state` cookie and sends the browser to Discord's
/// authorization page with the same state in the query string.
async fn discord(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let discord = &state.config.discord;
    let oauth_state = generate_state();
    let location =
        state
            .provider
            .authorize_url(&discord.client_id, &discord.redirect_uri, &oauth_state)?;

    let jar = jar.add(state_cookie(oauth_state));

    Ok((StatusCode::FOUND, jar, [(LOCATION, location)]).into_response())
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the Discord callback
///
/// Both are optional here so that a missing parameter is reported as a
/// state mismatch or missing code rather than a generic rejection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectQuery {
    /// CSRF state token echoed by Discord
    pub state: Option<String>,
    /// Authorization code
    pub code: Option<String>,
}

impl RedirectQuery {
    /// Parse a raw query string. A repeated parameter keeps its first value;
    /// unknown parameters are ignored.
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "state" => &mut parsed.state,
                "code" => &mut parsed.code,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.into_owned());
        }
        parsed
    }
}

/// Check the callback against the state cookie and return the code.
///
/// An empty cookie counts as missing.
pub fn redeem_code(jar: &CookieJar, query: &RedirectQuery) -> Result<String, AppError> {
    let expected = jar
        .get(STATE_COOKIE_NAME)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingStateCookie)?;

    if query.state.as_deref() != Some(expected) {
        return Err(AppError::StateMismatch);
    }

    match query.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(AppError::MissingCode),
    }
}

/// GET /redirect
///
/// Handles the OAuth callback from Discord.
///
/// # Steps
/// 1. Verify CSRF state and extract the code
/// 2. Exchange code for tokens
/// 3. Fetch the Discord profile
/// 4. Map the Discord id to a local user
/// 5. Issue access and refresh cookies
///
/// The first failing step ends the request. Nothing is persisted before
/// step 4, so there is nothing to roll back.
async fn redirect(
    State(state): State<AppState>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let query = RedirectQuery::parse(query.as_deref().unwrap_or_default());
    let result = complete_login(&state, &jar, &query).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(error) => error.error_type(),
    };
    crate::metrics::LOGIN_ATTEMPTS_TOTAL
        .with_label_values(&[outcome])
        .inc();

    let (access, refresh) = result?;
    let jar = CookieJar::new().add(access).add(refresh);

    Ok((jar, LOGIN_SUCCESS_BODY).into_response())
}

async fn complete_login(
    state: &AppState,
    jar: &CookieJar,
    query: &RedirectQuery,
) -> Result<(Cookie<'static>, Cookie<'static>), AppError> {
    let discord = &state.config.discord;

    let code = redeem_code(jar, query)?;

    let token_data = state
        .provider
        .fetch_token_data(
            &code,
            &discord.redirect_uri,
            &discord.client_id,
            &discord.client_secret,
        )
        .await
        .map_err(|error| {
            tracing::error!(%error, "Could not fetch token from Discord");
            AppError::TokenExchangeFailed
        })?;

    let profile = state
        .provider
        .fetch_profile(&token_data)
        .await
        .map_err(|error| {
            tracing::error!(%error, "Failed to fetch user data from Discord");
            AppError::ProfileFetchFailed
        })?;

    let user_id = state
        .db
        .ensure_user(&profile.external_user_id)
        .await
        .map_err(|error| {
            tracing::error!(
                %error,
                external_id = %profile.external_user_id,
                "Failed to insert or find user"
            );
            AppError::UserResolutionFailed
        })?;

    let cookies = state.sessions.issue_session(user_id).map_err(|error| {
        tracing::error!(%error, user_id, "Failed to sign session tokens");
        AppError::SessionIssuanceFailed
    })?;

    tracing::info!(user_id, "User logged in");

    Ok(cookies)
}

// =============================================================================
// Session routes
// =============================================================================

/// GET /me
async fn me(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<User>, AppError> {
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;
    let user = state.db.get_user(user_id).await?.ok_or(AppError::NotFound)?;

    Ok(Json(user))
}

/// POST /logout
///
/// Clears both session cookies. The tokens themselves stay valid until
/// they expire.
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let [access, refresh] = state.sessions.removal_cookies();
    let jar = CookieJar::new().add(access).add(refresh);

    (jar, StatusCode::NO_CONTENT)
}
