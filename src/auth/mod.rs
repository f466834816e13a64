//! Discord OAuth authentication
//!
//! Handles:
//! - Discord OAuth flow
//! - Session cookies
//! - Authentication middleware

mod middleware;
mod oauth;
pub mod provider;
pub mod session;
pub mod state;

pub use middleware::{CurrentUser, require_session};
pub use oauth::{LOGIN_SUCCESS_BODY, RedirectQuery, auth_router, redeem_code};
pub use provider::{Profile, ProviderClient, ProviderError, TokenResponse};
pub use session::{SessionClaims, SessionIssuer, SigningError, TokenKind};
