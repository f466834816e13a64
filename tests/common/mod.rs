//! Common test utilities for E2E tests

#![allow(dead_code)]

use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wingbox::{AppState, config};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client-id";
pub const REDIRECT_URI: &str = "http://localhost:3002/redirect";
pub const ACCESS_COOKIE: &str = "wingbox_access_token";
pub const REFRESH_COOKIE: &str = "wingbox_refresh_token";

/// Test server instance
///
/// Discord is replaced by a local mock server; the database lives in a
/// temporary directory that is removed on drop.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub discord: MockServer,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let discord = MockServer::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig { path: db_path },
            discord: config::DiscordConfig {
                client_id: CLIENT_ID.to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: REDIRECT_URI.to_string(),
                api_base_url: discord.uri(),
                authorize_url: "https://discord.com/oauth2/authorize".to_string(),
                scope: "identify".to_string(),
                request_timeout_seconds: 5,
            },
            session: config::SessionConfig {
                jwt_secret: "test-secret-key-that-is-32-bytes!".to_string(),
                jwt_salt: "0123456789abcdef".to_string(),
                issuer: "auth".to_string(),
                audience: "wingbox".to_string(),
                access_cookie_name: ACCESS_COOKIE.to_string(),
                refresh_cookie_name: REFRESH_COOKIE.to_string(),
                access_max_age: 900,
                refresh_max_age: 2_592_000,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Redirects are never followed so 302s can be inspected
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = wingbox::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            discord,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Make Discord accept any code and report `external_id` as the user.
    pub async fn mock_discord_login(&self, external_id: &str) {
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "mock_atoken_123",
                "refresh_token": "mock_rtoken_456",
                "token_type": "Bearer",
                "expires_in": 604800,
                "scope": "identify",
            })))
            .mount(&self.discord)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/users/@me"))
            .and(header("authorization", "Bearer mock_atoken_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": external_id,
                "username": "nelly",
            })))
            .mount(&self.discord)
            .await;
    }

    /// Run `/redirect` with a matching state cookie and code.
    pub async fn complete_login(&self) -> reqwest::Response {
        self.client
            .get(self.url("/redirect?state=abc123&code=auth_code_123"))
            .header("Cookie", "oauth_state=abc123")
            .send()
            .await
            .expect("request succeeds")
    }
}

/// All `Set-Cookie` values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Value of cookie `name` among `Set-Cookie` headers
pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies.iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}
