//! Session tokens
//!
//! A login mints two HS256 JWTs, each carried in its own HTTP-only cookie:
//! a short-lived access token and a long-lived refresh token. No server-side
//! session storage is needed; verification only needs the signing key.
//!
//! The signing key is derived once at startup as
//! `HMAC-SHA256(key = salt, message = secret)`.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::AppError;

/// Failure signing or verifying a session token
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("could not sign session token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("invalid session token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Which of the two token classes a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in both token classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Unique token id
    pub jti: String,
    /// Local user id, as a decimal string
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    /// Local user id of the subject
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Cookie and claim policy of one token class
#[derive(Debug, Clone)]
struct TokenClass {
    cookie_name: String,
    audience: String,
    max_age: i64,
}

/// Issues and verifies the access/refresh cookie pair
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access: TokenClass,
    refresh: TokenClass,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("issuer", &self.issuer)
            .field("access", &self.access)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

/// Derive the HS256 key from the configured secret and salt
fn derive_signing_key(secret: &[u8], salt: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(salt)
        .map_err(|e| AppError::Config(format!("invalid session salt: {e}")))?;
    mac.update(secret);
    Ok(mac.finalize().into_bytes().to_vec())
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig) -> Result<Self, AppError> {
        let key = derive_signing_key(config.jwt_secret.as_bytes(), config.jwt_salt.as_bytes())?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            issuer: config.issuer.clone(),
            access: TokenClass {
                cookie_name: config.access_cookie_name.clone(),
                audience: config.audience.clone(),
                max_age: config.access_max_age,
            },
            refresh: TokenClass {
                cookie_name: config.refresh_cookie_name.clone(),
                audience: format!("{}:refresh", config.audience),
                max_age: config.refresh_max_age,
            },
        })
    }

    fn class(&self, kind: TokenKind) -> &TokenClass {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Cookie name used for `kind`
    pub fn cookie_name(&self, kind: TokenKind) -> &str {
        &self.class(kind).cookie_name
    }

    /// Mint the access and refresh cookies for `user_id`
    pub fn issue_session(
        &self,
        user_id: i64,
    ) -> Result<(Cookie<'static>, Cookie<'static>), SigningError> {
        let access = self.issue(TokenKind::Access, user_id)?;
        let refresh = self.issue(TokenKind::Refresh, user_id)?;
        Ok((access, refresh))
    }

    fn issue(&self, kind: TokenKind, user_id: i64) -> Result<Cookie<'static>, SigningError> {
        let class = self.class(kind);
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            jti: Uuid::new_v4().to_string(),
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: class.audience.clone(),
            iat: now,
            exp: now + class.max_age,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(SigningError::Encode)?;

        Ok(Cookie::build((class.cookie_name.clone(), token))
            .path("/")
            .max_age(time::Duration::seconds(class.max_age))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Lax)
            .build())
    }

    /// Check signature, issuer, audience and expiry of a `kind` token
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<SessionClaims, SigningError> {
        let class = self.class(kind);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[class.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(SigningError::Invalid)
    }

    /// Removal cookies for both token classes
    pub fn removal_cookies(&self) -> [Cookie<'static>; 2] {
        [&self.access, &self.refresh].map(|class| {
            let mut cookie = Cookie::build((class.cookie_name.clone(), String::new()))
                .path("/")
                .http_only(true)
                .secure(true)
                .same_site(SameSite::Lax)
                .build();
            cookie.make_removal();
            cookie
        })
    }
}
