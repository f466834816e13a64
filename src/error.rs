//! Error types for Wingbox
//!
//! All errors that reach a handler boundary are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Client-caused failures (400/401/404) carry a message that is safe to
//! show. Upstream, storage and signing failures answer with a generic
//! message; their detail goes to the log at the point of failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// The `oauth_state` cookie was not sent with the callback (400)
    #[error("OAuth state cookie not found")]
    MissingStateCookie,

    /// The callback `state` parameter does not match the cookie (400)
    #[error("Cookie state and query state do not match")]
    StateMismatch,

    /// The callback carried no authorization code (400)
    #[error("Query code not found")]
    MissingCode,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Exchanging the authorization code with the provider failed (500)
    #[error("Could not exchange authorization code with provider")]
    TokenExchangeFailed,

    /// Fetching the provider profile failed (500)
    #[error("Could not fetch user profile from provider")]
    ProfileFetchFailed,

    /// Mapping the external identity to a local user failed (500)
    #[error("Could not resolve local user")]
    UserResolutionFailed,

    /// Signing the session tokens failed (500)
    #[error("Could not issue session")]
    SessionIssuanceFailed,

    /// Datastore error (500)
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status, client-facing message and metric label for this error
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::MissingStateCookie => {
                (StatusCode::BAD_REQUEST, self.to_string(), "missing_state_cookie")
            }
            AppError::StateMismatch => (StatusCode::BAD_REQUEST, self.to_string(), "state_mismatch"),
            AppError::MissingCode => (StatusCode::BAD_REQUEST, self.to_string(), "missing_code"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::TokenExchangeFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "token_exchange",
            ),
            AppError::ProfileFetchFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "profile_fetch",
            ),
            AppError::UserResolutionFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "user_resolution",
            ),
            AppError::SessionIssuanceFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "session_issuance",
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
                "storage",
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                "config",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        }
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    /// Short label used in logs and metrics
    pub fn error_type(&self) -> &'static str {
        self.parts().2
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to its status code and a JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
