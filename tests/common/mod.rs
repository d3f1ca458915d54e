//! Common test utilities for E2E tests

use std::sync::Arc;

use axum::async_trait;
use gatehouse::auth::{
    CallbackParams, HandshakeStart, IdentityProvider, ProviderProfile, ProviderRegistry,
};
use gatehouse::data::{Database, Provider};
use gatehouse::error::AppError;
use gatehouse::{AppState, config};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const CLIENT_ORIGIN: &str = "http://localhost:3000";
pub const STUB_STATE: &str = "stub-state";

/// Provider double that skips the network.
///
/// The authorization code is `"{external_id}:{name}"`; the code `"fail"`
/// makes the provider reject the handshake.
pub struct StubProvider {
    provider: Provider,
}

impl StubProvider {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn begin(&self, callback_url: &str) -> Result<HandshakeStart, AppError> {
        Ok(HandshakeStart {
            location: format!(
                "https://{}.provider.test/authorize?state={}&redirect_uri={}",
                self.provider,
                STUB_STATE,
                urlencoding::encode(callback_url)
            ),
            pending: STUB_STATE.to_string(),
        })
    }

    async fn complete(
        &self,
        _callback_url: &str,
        pending: &str,
        params: &CallbackParams,
    ) -> Result<ProviderProfile, AppError> {
        if params.state.as_deref() != Some(pending) {
            return Err(AppError::Unauthorized);
        }

        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AppError::Validation("missing code".to_string()))?;
        if code == "fail" {
            return Err(AppError::Provider("stub provider rejected the code".to_string()));
        }

        let (id, name) = code.split_once(':').unwrap_or((code, code));
        let (id, name) = (id.to_string(), name.to_string());

        Ok(match self.provider {
            Provider::Google => ProviderProfile::Google {
                id,
                given_name: Some(name),
                name: None,
            },
            Provider::Twitter => ProviderProfile::Twitter { id, username: name },
            Provider::GitHub => ProviderProfile::GitHub { id, username: name },
        })
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a test server with all three providers stubbed
    pub async fn new() -> Self {
        Self::with_providers(&Provider::ALL).await
    }

    /// Create a test server with only the given providers stubbed
    pub async fn with_providers(providers: &[Provider]) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "localhost:4000".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
                client_origin: CLIENT_ORIGIN.to_string(),
                failure_redirect: "/login".to_string(),
                session_sweep_interval_seconds: 3600,
            },
            providers: config::ProvidersConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let registry = providers
            .iter()
            .fold(ProviderRegistry::default(), |registry, provider| {
                registry.with_provider(StubProvider::new(*provider))
            });
        let state = AppState::from_parts(config, db, registry);

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = gatehouse::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a handshake and return the signed pending cookie
    pub async fn begin(&self, provider: Provider) -> String {
        let response = self
            .client
            .get(self.url(&format!("/auth/{provider}")))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        cookie_value(&response, &format!("oauth_pending_{provider}"))
            .expect("begin must set the pending cookie")
    }

    /// Run a full login and return the callback response
    pub async fn login(&self, provider: Provider, code: &str) -> reqwest::Response {
        let pending = self.begin(provider).await;

        self.client
            .get(self.url(&format!("/auth/{provider}/callback")))
            .query(&[("code", code), ("state", STUB_STATE)])
            .header("Cookie", format!("oauth_pending_{provider}={pending}"))
            .send()
            .await
            .unwrap()
    }

    /// Run a full login and return the session cookie value
    pub async fn login_session(&self, provider: Provider, code: &str) -> String {
        let response = self.login(provider, code).await;
        assert_eq!(location(&response).as_deref(), Some(CLIENT_ORIGIN));
        cookie_value(&response, "session").expect("login must set the session cookie")
    }

    /// Run one statement against the server's database file, bypassing the
    /// pool; used to break the store underneath a running server
    pub async fn execute_raw(&self, statement: &str) {
        let options = SqliteConnectOptions::new()
            .filename(self._temp_dir.path().join("test.db"))
            .foreign_keys(false);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query(statement).execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();
    }

    /// GET /getuser with an optional session cookie
    pub async fn get_user(&self, session: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url("/getuser"));
        if let Some(session) = session {
            request = request.header("Cookie", format!("session={session}"));
        }
        request.send().await.unwrap()
    }
}

/// Value of the named cookie in the response's Set-Cookie headers
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find_map(|pair| pair.trim().strip_prefix(&prefix).map(ToString::to_string))
        .filter(|value| !value.is_empty())
}

/// Location header of a redirect response
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
