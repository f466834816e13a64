//! Discord API client
//!
//! Covers the two server-side calls of the authorization code flow:
//! exchanging the code for tokens and reading the current user's profile.

use std::time::{Duration, Instant};

use reqwest::{RequestBuilder, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::DiscordConfig;
use crate::error::AppError;

/// Failure talking to the identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or the body could not be read
    #[error("provider request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The provider answered with something other than 200 OK
    #[error("provider returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    /// The response body was not the expected JSON document
    #[error("could not decode provider response: {0}")]
    DecodeFailed(#[from] serde_json::Error),
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Subset of `GET /users/@me`
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Discord snowflake of the user
    #[serde(rename = "id")]
    pub external_user_id: String,
}

/// HTTP client bound to one Discord application
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    api_base_url: String,
    authorize_url: String,
    scope: String,
}

impl ProviderClient {
    /// Build a client from configuration.
    ///
    /// Every request is bounded by `request_timeout_seconds`.
    pub fn new(config: &DiscordConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("Wingbox/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self::with_http_client(http, config))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: &DiscordConfig) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            authorize_url: config.authorize_url.clone(),
            scope: config.scope.clone(),
        }
    }

    /// URL the browser is sent to in order to approve the login
    pub fn authorize_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, AppError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| AppError::Config(format!("invalid authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange an authorization code for access and refresh tokens
    pub async fn fetch_token_data(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, ProviderError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let request = self
            .http
            .post(format!("{}/api/oauth2/token", self.api_base_url))
            .form(&form);

        self.fetch("token", request).await
    }

    /// Fetch the profile of the user the tokens belong to
    pub async fn fetch_profile(&self, token_data: &TokenResponse) -> Result<Profile, ProviderError> {
        let request = self
            .http
            .get(format!("{}/api/users/@me", self.api_base_url))
            .header(AUTHORIZATION, format!("Bearer {}", token_data.access_token));

        self.fetch("profile", request).await
    }

    /// Send `request`, require 200 OK and decode the JSON body into `T`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let started = Instant::now();
        let observe = |status: &str| {
            crate::metrics::observe_provider_request(endpoint, status, started.elapsed())
        };

        let response = request.send().await.inspect_err(|_| observe("error"))?;

        let status = response.status();
        observe(status.as_str());
        if status != StatusCode::OK {
            tracing::warn!(endpoint, %status, "Provider rejected request");
            return Err(ProviderError::UnexpectedStatus(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
