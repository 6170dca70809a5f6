// src/oauth2.rs
//
// OAuth2 installed-app flow for the Gmail API.
// Produces the Session handed to the pipeline; nothing else touches the token file.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use secure_string::SecureString;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use crate::cfg::secure;
use crate::error::{Error, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read + label changes + delete. Changing this invalidates cached tokens.
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

const STATE: &str = "gmail-headline";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 300;

const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Time source for token expiry; tests pin it to a fixed instant.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Authenticated handle shared read-only by every stage of a run.
#[derive(Clone)]
pub struct Session {
    access_token: SecureString,
}

impl Session {
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: SecureString::from(access_token.to_string()),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.unsecure())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Session { access_token: *** }")
    }
}

/// OAuth2 client registration from a Google Cloud Console JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,

    #[serde(deserialize_with = "secure::deserialize")]
    pub client_secret: SecureString,

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

/// Console files wrap the registration in `installed` (desktop) or `web`.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading client secret from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Credential(format!("unable to read client secret file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| Error::Credential(format!("unable to parse client secret file: {}", e)))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| Error::Credential("client secret file has no 'installed' or 'web' section".to_string()))
    }
}

/// Token cache persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(serialize_with = "secure::serialize", deserialize_with = "secure::deserialize")]
    pub access_token: SecureString,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "secure::serialize_opt",
        deserialize_with = "secure::deserialize_opt"
    )]
    pub refresh_token: Option<SecureString>,

    /// Unix seconds; absent means unknown, treated as expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredToken {
    pub fn is_fresh<C: Clock>(&self, clock: &C) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > (clock.now() + Duration::seconds(EXPIRY_MARGIN_SECS)).timestamp(),
            None => false,
        }
    }
}

/// Why a call to the token endpoint failed.
#[derive(Debug)]
enum TokenError {
    /// The refresh token was revoked or expired; only new consent helps.
    InvalidGrant(String),
    Failed(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidGrant(msg) | TokenError::Failed(msg) => f.write_str(msg),
        }
    }
}

impl From<TokenError> for Error {
    fn from(e: TokenError) -> Self {
        Error::Credential(e.to_string())
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Loads, refreshes and acquires OAuth2 tokens for one client registration.
pub struct CredentialStore<C: Clock = RealClock> {
    secret: ClientSecret,
    token_path: PathBuf,
    clock: C,
    agent: ureq::Agent,
}

impl CredentialStore<RealClock> {
    pub fn new(secret: ClientSecret, token_path: &Path) -> Self {
        Self::with_clock(secret, token_path, RealClock)
    }
}

impl<C: Clock> CredentialStore<C> {
    pub fn with_clock(secret: ClientSecret, token_path: &Path, clock: C) -> Self {
        Self {
            secret,
            token_path: token_path.to_path_buf(),
            clock,
            agent: ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build(),
        }
    }

    /// Bound every token endpoint request by `timeout`.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self
    }

    /// Cached token if still valid, else refreshed, else interactively authorized.
    ///
    /// Interactive authorization only happens when there is no usable refresh
    /// token or Google rejects it with `invalid_grant`. Any other refresh
    /// failure is returned so an unattended run exits instead of waiting.
    pub fn session(&self) -> Result<Session> {
        if let Some(token) = self.load_token() {
            if token.is_fresh(&self.clock) {
                debug!("Using cached access token from {}", self.token_path.display());
                return Ok(Session {
                    access_token: token.access_token,
                });
            }

            if let Some(refresh_token) = &token.refresh_token {
                match self.refresh(refresh_token) {
                    Ok(fresh) => {
                        self.save_token(&fresh)?;
                        return Ok(Session {
                            access_token: fresh.access_token,
                        });
                    }
                    Err(TokenError::InvalidGrant(reason)) => {
                        warn!("Refresh token rejected, re-authorizing: {}", reason)
                    }
                    Err(TokenError::Failed(reason)) => {
                        return Err(Error::Credential(format!("token refresh failed: {}", reason)));
                    }
                }
            }
        }

        let token = self.authorize_interactively()?;
        self.save_token(&token)?;
        Ok(Session {
            access_token: token.access_token,
        })
    }

    /// A missing or unreadable cache is a miss, not an error.
    pub fn load_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    pub fn save_token(&self, token: &StoredToken) -> Result<()> {
        info!("Saving credential file to: {}", self.token_path.display());

        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.cache_error(e))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let content = serde_json::to_vec_pretty(token).map_err(|e| self.cache_error(e.into()))?;
        options
            .open(&self.token_path)
            .and_then(|mut f| f.write_all(&content))
            .map_err(|e| self.cache_error(e))
    }

    /// Consent URL the user has to visit.
    pub fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.secret.auth_uri,
            urlencoding::encode(&self.secret.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(GMAIL_SCOPE),
            STATE,
        )
    }

    fn refresh(&self, refresh_token: &SecureString) -> std::result::Result<StoredToken, TokenError> {
        info!("Refreshing OAuth2 access token");
        let response = self.token_request(&[
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.unsecure()),
            ("refresh_token", refresh_token.unsecure()),
            ("grant_type", "refresh_token"),
        ])?;

        let mut token = self.stored_from(response);
        // Google usually omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.clone());
        }
        Ok(token)
    }

    fn authorize_interactively(&self) -> Result<StoredToken> {
        if !io::stdin().is_terminal() {
            return Err(Error::Credential(format!(
                "no usable token at {}; run gmail-headline once from a terminal to authorize",
                self.token_path.display()
            )));
        }

        let listener = TcpListener::bind("127.0.0.1:0").ok();
        let redirect_uri = match listener.as_ref().and_then(|l| l.local_addr().ok()) {
            Some(addr) => format!("http://127.0.0.1:{}", addr.port()),
            None => "http://localhost".to_string(),
        };

        println!(
            "Go to the following link in your browser to authorize gmail-headline:\n{}",
            self.authorization_url(&redirect_uri)
        );

        let code = match listener {
            Some(listener) => {
                println!("Waiting for authorization on {} ...", redirect_uri);
                wait_for_callback(listener)?
            }
            None => {
                println!("Paste the `code` parameter from the redirected URL:");
                read_code_from_stdin()?
            }
        };

        info!("Exchanging authorization code for tokens");
        let response = self.token_request(&[
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.unsecure()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ])?;
        Ok(self.stored_from(response))
    }

    fn token_request(&self, form: &[(&str, &str)]) -> std::result::Result<TokenResponse, TokenError> {
        let response = self
            .agent
            .post(&self.secret.token_uri)
            .send_form(form)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    let msg = format!("token endpoint returned HTTP {}: {}", code, body);
                    if (code == 400 || code == 401) && body.contains("invalid_grant") {
                        TokenError::InvalidGrant(msg)
                    } else {
                        TokenError::Failed(msg)
                    }
                }
                other => TokenError::Failed(format!("token request failed: {}", other)),
            })?;

        response
            .into_json()
            .map_err(|e| TokenError::Failed(format!("failed to parse token response: {}", e)))
    }

    fn stored_from(&self, response: TokenResponse) -> StoredToken {
        StoredToken {
            access_token: SecureString::from(response.access_token),
            refresh_token: response.refresh_token.map(SecureString::from),
            expires_at: response
                .expires_in
                .map(|secs| (self.clock.now() + Duration::seconds(secs)).timestamp()),
        }
    }

    fn cache_error(&self, e: io::Error) -> Error {
        Error::Credential(format!("unable to cache oauth token at {}: {}", self.token_path.display(), e))
    }
}

/// Read the client secret and produce a session, authorizing if needed.
pub fn get_session(
    client_secret_path: &Path,
    token_path: &Path,
    timeout: std::time::Duration,
) -> Result<Session> {
    let secret = ClientSecret::from_file(client_secret_path)?;
    CredentialStore::new(secret, token_path).with_timeout(timeout).session()
}

fn wait_for_callback(listener: TcpListener) -> Result<String> {
    let (mut stream, _) = listener
        .accept()
        .map_err(|e| Error::Credential(format!("failed to accept authorization callback: {}", e)))?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .map_err(|e| Error::Credential(format!("failed to read authorization callback: {}", e)))?;

    let result = parse_callback(&request_line);
    let (status, body) = match result {
        Ok(_) => ("200 OK", "Authorization complete. You can close this window."),
        Err(_) => ("400 Bad Request", "Authorization failed. Check the terminal."),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();

    result
}

/// Pull the authorization code out of `GET /?code=...&state=... HTTP/1.1`.
pub fn parse_callback(request_line: &str) -> Result<String> {
    let query = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?'))
        .map(|(_, q)| q)
        .unwrap_or("");

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => return Err(Error::Credential(format!("authorization denied: {}", value))),
            _ => {}
        }
    }

    if state.as_deref() != Some(STATE) {
        return Err(Error::Credential("authorization callback state mismatch".to_string()));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Credential("no authorization code in callback".to_string()))
}

fn read_code_from_stdin() -> Result<String> {
    let mut code = String::new();
    io::stdin()
        .read_line(&mut code)
        .map_err(|e| Error::Credential(format!("unable to read authorization code: {}", e)))?;
    let code = code.trim().to_string();
    if code.is_empty() {
        return Err(Error::Credential("empty authorization code".to_string()));
    }
    Ok(code)
}
