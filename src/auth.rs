//! Google OAuth2 for read-only calendar access, with the token cached on disk between runs.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

use crate::error::AuthError;

pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_FILE: &str = "token.json";
const PKG_NAME: &str = env!("CARGO_PKG_NAME");
/// Treat tokens this close to expiry as already expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The cached token bundle, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expiry
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NoCredentials,
    CachedValid(StoredToken),
    CachedExpiredRefreshable(StoredToken),
    CachedExpiredTerminal(StoredToken),
    AuthenticatedFresh(StoredToken),
}

impl AuthState {
    pub fn classify(cached: Option<StoredToken>, now: DateTime<Utc>) -> Self {
        match cached {
            None => AuthState::NoCredentials,
            Some(token) if token.is_valid_at(now) => AuthState::CachedValid(token),
            Some(token) if token.refresh_token.is_some() => {
                AuthState::CachedExpiredRefreshable(token)
            }
            Some(token) => AuthState::CachedExpiredTerminal(token),
        }
    }

    /// Take one transition. Terminal states are returned unchanged.
    pub async fn advance<P: TokenProvider>(self, provider: &P) -> Result<AuthState, AuthError> {
        match self {
            AuthState::NoCredentials | AuthState::CachedExpiredTerminal(_) => {
                info!("No usable cached token, starting interactive login");
                Ok(AuthState::AuthenticatedFresh(provider.login().await?))
            }
            AuthState::CachedExpiredRefreshable(token) => match provider.refresh(&token).await {
                Ok(fresh) => {
                    info!("Refreshed cached access token");
                    Ok(AuthState::AuthenticatedFresh(fresh))
                }
                Err(e) => {
                    warn!("Token refresh failed, falling back to login: {}", e);
                    Ok(AuthState::NoCredentials)
                }
            },
            done @ (AuthState::CachedValid(_) | AuthState::AuthenticatedFresh(_)) => Ok(done),
        }
    }
}

/// Something that can mint tokens: the real Google endpoints, or a fake in tests.
pub trait TokenProvider {
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError>;
    async fn login(&self) -> Result<StoredToken, AuthError>;
}

/// The on-disk token cache. Last writer wins.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

static DEFAULT_TOKEN_PATH: OnceLock<PathBuf> = OnceLock::new();

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `explicit` if given, else `token.json` in the XDG data directory,
    /// resolved once per process.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, AuthError> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = DEFAULT_TOKEN_PATH.get() {
            return Ok(Self::new(path.clone()));
        }

        let path = xdg::BaseDirectories::with_prefix(PKG_NAME)
            .place_data_file(TOKEN_FILE)
            .map_err(|source| AuthError::TokenStore {
                path: PathBuf::from(TOKEN_FILE),
                source,
            })?;
        Ok(Self::new(DEFAULT_TOKEN_PATH.get_or_init(|| path).clone()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing or unreadable cache counts as no credentials.
    pub fn load(&self) -> Option<StoredToken> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No token cached at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read token at {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring undecodable token at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, json).map_err(|source| AuthError::TokenStore {
            path: self.path.clone(),
            source,
        })?;
        info!("Stored token at {}", self.path.display());
        Ok(())
    }
}

/// Drive the state machine to a usable token, saving it if it is new.
pub async fn run_auth<P: TokenProvider>(
    mut state: AuthState,
    provider: &P,
    store: &TokenStore,
) -> Result<StoredToken, AuthError> {
    loop {
        state = match state {
            AuthState::CachedValid(token) => {
                debug!("Using cached access token");
                return Ok(token);
            }
            AuthState::AuthenticatedFresh(token) => {
                store.save(&token)?;
                return Ok(token);
            }
            other => other.advance(provider).await?,
        };
    }
}

/// Get a calendar access token, reading the client secrets only when a refresh or login is needed.
pub async fn authenticate(
    store: &TokenStore,
    credentials_path: &Path,
) -> Result<StoredToken, AuthError> {
    let state = AuthState::classify(store.load(), Utc::now());
    if let AuthState::CachedValid(token) = state {
        return Ok(token);
    }

    let provider = GoogleOAuth::from_secrets_file(credentials_path)?;
    run_auth(state, &provider, store).await
}

/// An OAuth client from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path).map_err(|source| AuthError::ClientSecretsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |reason: String| AuthError::ClientSecretsInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let file: ClientSecretsFile =
            serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| invalid("expected an `installed` or `web` client".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expiry: Utc::now() + Duration::seconds(self.expires_in.unwrap_or(3600)),
        }
    }
}

pub struct GoogleOAuth {
    secrets: ClientSecrets,
    client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_secrets_file(path: &Path) -> Result<Self, AuthError> {
        Ok(Self::new(ClientSecrets::from_file(path)?))
    }

    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", CALENDAR_READONLY_SCOPE),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AuthError::Flow(format!("invalid auth_uri: {e}")))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, AuthError> {
        let response = self
            .token_request(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        Ok(response.into_stored(None))
    }
}

impl TokenProvider for GoogleOAuth {
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Flow("no refresh token available".to_string()))?;

        let response = self
            .token_request(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        Ok(response.into_stored(Some(refresh_token)))
    }

    async fn login(&self) -> Result<StoredToken, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.authorization_url(&redirect_uri, &state)?;

        eprintln!("Please visit this URL to authorize calendar access:\n{auth_url}");
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Could not open a browser for login: {}", e);
        }

        let code = wait_for_redirect(listener, &state).await?;
        self.exchange_code(&code, &redirect_uri).await
    }
}

const REDIRECT_PAGE: &str = "<html><body><h1>Authorization complete</h1><p>You can close this window.</p></body></html>";
/// How long the redirect page gets to reach the browser once the code has arrived.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

type RedirectParams = HashMap<String, String>;
type RedirectSender = Arc<Mutex<Option<oneshot::Sender<RedirectParams>>>>;

async fn handle_redirect(Query(params): Query<RedirectParams>, sender: RedirectSender) -> Response {
    if !params.contains_key("code") && !params.contains_key("error") {
        debug!("Ignoring redirect without code or error");
        return StatusCode::NOT_FOUND.into_response();
    }

    let sender = sender.lock().ok().and_then(|mut guard| guard.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(params);
            Html(REDIRECT_PAGE).into_response()
        }
        None => StatusCode::GONE.into_response(),
    }
}

/// Serve the loopback redirect and return the authorization code it carries.
async fn wait_for_redirect(listener: TcpListener, expected_state: &str) -> Result<String, AuthError> {
    let (params_tx, params_rx) = oneshot::channel();
    let sender: RedirectSender = Arc::new(Mutex::new(Some(params_tx)));
    let app = Router::new().route(
        "/",
        get(move |query: Query<RedirectParams>| handle_redirect(query, sender.clone())),
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            warn!("OAuth redirect server error: {}", e);
        }
    });

    let params = params_rx.await;
    let _ = shutdown_tx.send(());
    // Idle browser connections can hold a graceful shutdown open indefinitely.
    let abort = server.abort_handle();
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        abort.abort();
    }

    let params = params.map_err(|_| AuthError::Flow("redirect server stopped early".to_string()))?;
    if let Some(error) = params.get("error") {
        return Err(AuthError::Flow(format!("authorization denied: {error}")));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::Flow("state mismatch in OAuth redirect".to_string()));
    }
    match params.get("code") {
        Some(code) => Ok(code.clone()),
        None => Err(AuthError::Flow("redirect carried no code".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(expiry: DateTime<Utc>, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: "access".to_string(),
            refresh_token: refresh.map(str::to_string),
            expiry,
        }
    }

    struct FakeProvider {
        refresh_ok: bool,
        refreshes: Cell<u32>,
        logins: Cell<u32>,
    }

    impl FakeProvider {
        fn new(refresh_ok: bool) -> Self {
            Self {
                refresh_ok,
                refreshes: Cell::new(0),
                logins: Cell::new(0),
            }
        }
    }

    impl TokenProvider for FakeProvider {
        async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError> {
            self.refreshes.set(self.refreshes.get() + 1);
            if self.refresh_ok {
                Ok(StoredToken {
                    access_token: "refreshed".to_string(),
                    refresh_token: token.refresh_token.clone(),
                    expiry: Utc::now() + Duration::hours(1),
                })
            } else {
                Err(AuthError::Flow("revoked".to_string()))
            }
        }

        async fn login(&self) -> Result<StoredToken, AuthError> {
            self.logins.set(self.logins.get() + 1);
            Ok(token(Utc::now() + Duration::hours(1), Some("new-refresh")))
        }
    }

    #[test]
    fn test_classify() {
        let now = Utc::now();
        assert_eq!(AuthState::classify(None, now), AuthState::NoCredentials);

        let valid = token(now + Duration::hours(1), None);
        assert!(matches!(
            AuthState::classify(Some(valid), now),
            AuthState::CachedValid(_)
        ));

        let nearly = token(now + Duration::seconds(30), Some("r"));
        assert!(matches!(
            AuthState::classify(Some(nearly), now),
            AuthState::CachedExpiredRefreshable(_)
        ));

        let dead = token(now - Duration::hours(1), None);
        assert!(matches!(
            AuthState::classify(Some(dead), now),
            AuthState::CachedExpiredTerminal(_)
        ));
    }

    #[tokio::test]
    async fn test_valid_token_is_used_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let provider = FakeProvider::new(true);
        let cached = token(Utc::now() + Duration::hours(1), None);

        let got = run_auth(AuthState::CachedValid(cached.clone()), &provider, &store)
            .await
            .unwrap();
        assert_eq!(got, cached);
        assert_eq!(provider.logins.get(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_refresh_success_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let provider = FakeProvider::new(true);
        let stale = token(Utc::now() - Duration::hours(1), Some("r"));

        let got = run_auth(AuthState::CachedExpiredRefreshable(stale), &provider, &store)
            .await
            .unwrap();
        assert_eq!(got.access_token, "refreshed");
        assert_eq!(provider.refreshes.get(), 1);
        assert_eq!(provider.logins.get(), 0);
        assert_eq!(store.load(), Some(got));
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let provider = FakeProvider::new(false);
        let stale = token(Utc::now() - Duration::hours(1), Some("r"));

        let got = run_auth(AuthState::CachedExpiredRefreshable(stale), &provider, &store)
            .await
            .unwrap();
        assert_eq!(got.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(provider.refreshes.get(), 1);
        assert_eq!(provider.logins.get(), 1);
        assert_eq!(store.load(), Some(got));
    }

    #[tokio::test]
    async fn test_terminal_token_goes_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let provider = FakeProvider::new(true);
        let dead = token(Utc::now() - Duration::hours(1), None);

        run_auth(AuthState::CachedExpiredTerminal(dead), &provider, &store)
            .await
            .unwrap();
        assert_eq!(provider.refreshes.get(), 0);
        assert_eq!(provider.logins.get(), 1);
    }

    #[test]
    fn test_store_round_trip_and_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert_eq!(store.load(), None);

        let saved = token(Utc::now(), Some("r"));
        store.save(&saved).unwrap();
        assert_eq!(store.load(), Some(saved));

        fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let store = TokenStore::new("/definitely/not/here/token.json");
        let err = store.save(&token(Utc::now(), None)).unwrap_err();
        assert!(matches!(err, AuthError::TokenStore { .. }));
    }

    #[test]
    fn test_client_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        fs::write(&path, r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#).unwrap();
        let secrets = ClientSecrets::from_file(&path).unwrap();
        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);

        fs::write(&path, r#"{"other": {}}"#).unwrap();
        assert!(matches!(
            ClientSecrets::from_file(&path),
            Err(AuthError::ClientSecretsInvalid { .. })
        ));

        assert!(matches!(
            ClientSecrets::from_file(&dir.path().join("missing.json")),
            Err(AuthError::ClientSecretsIo { .. })
        ));
    }

    fn secrets(token_uri: String) -> ClientSecrets {
        ClientSecrets {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri,
        }
    }

    #[test]
    fn test_authorization_url() {
        let oauth = GoogleOAuth::new(secrets(DEFAULT_TOKEN_URI.to_string()));
        let url = oauth
            .authorization_url("http://127.0.0.1:9999/", "xyz")
            .unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(params["scope"], CALENDAR_READONLY_SCOPE);
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:9999/");
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": CALENDAR_READONLY_SCOPE,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(secrets(format!("{}/token", server.uri())));
        let stale = token(Utc::now() - Duration::hours(1), Some("old-refresh"));
        let fresh = oauth.refresh(&stale).await.unwrap();

        assert_eq!(fresh.access_token, "fresh");
        assert_eq!(fresh.refresh_token.as_deref(), Some("old-refresh"));
        assert!(fresh.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#))
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(secrets(format!("{}/token", server.uri())));
        let stale = token(Utc::now() - Duration::hours(1), Some("old-refresh"));
        let err = oauth.refresh(&stale).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenEndpoint { .. }));
    }

    async fn send_redirect(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_wait_for_redirect_skips_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = tokio::spawn(async move {
            let first = send_redirect(port, "/favicon.ico").await;
            let second = send_redirect(port, "/?state=abc&code=4%2Fcode").await;
            (first, second)
        });

        let code = wait_for_redirect(listener, "abc").await.unwrap();
        let (first, second) = client.await.unwrap();
        assert_eq!(code, "4/code");
        assert!(first.starts_with("HTTP/1.1 404"));
        assert!(second.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn test_wait_for_redirect_rejects_wrong_state() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = tokio::spawn(async move { send_redirect(port, "/?state=evil&code=c").await });

        let err = wait_for_redirect(listener, "abc").await.unwrap_err();
        client.await.unwrap();
        assert!(matches!(err, AuthError::Flow(msg) if msg.contains("state")));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_redirect() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let client = tokio::spawn(async move { send_redirect(port, "/?state=abc&code=c").await });

        let code = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            wait_for_redirect(listener, "abc"),
        )
        .await
        .expect("redirect was not served while another connection sat idle")
        .unwrap();
        assert_eq!(code, "c");
        assert!(client.await.unwrap().starts_with("HTTP/1.1 200"));
        drop(idle);
    }

    #[tokio::test]
    async fn test_wait_for_redirect_reports_denied_access() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client =
            tokio::spawn(async move { send_redirect(port, "/?error=access_denied&state=abc").await });

        let err = wait_for_redirect(listener, "abc").await.unwrap_err();
        assert!(client.await.unwrap().starts_with("HTTP/1.1 200"));
        assert!(matches!(err, AuthError::Flow(msg) if msg.contains("access_denied")));
    }
}
