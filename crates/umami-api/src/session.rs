// Bearer token session
//
// Owns the single credential shared by every request of the exporter.
// Readers clone the current token under a shared lock; a login replaces
// it wholesale under the exclusive lock. Logins are serialized so that a
// burst of concurrent callers without a token triggers one round-trip.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Field names that carry the token in known login response shapes,
/// in order of preference.
const TOKEN_FIELDS: [&str; 4] = ["token", "accessToken", "access_token", "jwt"];

/// Nesting depth searched for a token field before giving up.
const MAX_TOKEN_DEPTH: usize = 8;

/// Username/password pair used for `POST /api/auth/login`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// A bearer token as handed out by [`Session::ensure`].
///
/// Cheap to clone; identity (`Arc::ptr_eq`) tells whether two requests
/// used the same login.
pub type Token = Arc<SecretString>;

/// Login state for one Umami instance.
pub struct Session {
    http: reqwest::Client,
    login_url: Url,
    credentials: Credentials,
    token: RwLock<Option<Token>>,
    /// Serializes logins. Held across the login round-trip.
    login_lock: Mutex<()>,
}

impl Session {
    pub fn new(http: reqwest::Client, base_url: &Url, credentials: Credentials) -> Result<Self, Error> {
        let login_url = crate::client::endpoint(base_url, "api/auth/login")?;
        Ok(Self {
            http,
            login_url,
            credentials,
            token: RwLock::new(None),
            login_lock: Mutex::new(()),
        })
    }

    /// The cached token, if any. Never performs I/O.
    pub async fn current(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    /// Return the cached token, logging in first if there is none.
    pub async fn ensure(&self) -> Result<Token, Error> {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let _guard = self.login_lock.lock().await;
        // Another caller may have logged in while we waited for the lock.
        if let Some(token) = self.current().await {
            return Ok(token);
        }
        self.login_locked().await
    }

    /// Drop the cached token; the next [`ensure`](Self::ensure) logs in again.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// Drop the cached token only if it is still `stale`.
    ///
    /// Returns `false` when another request already replaced it, in which
    /// case the replacement is kept.
    pub async fn invalidate_if(&self, stale: &Token) -> bool {
        let mut guard = self.token.write().await;
        match guard.as_ref() {
            Some(current) if Arc::ptr_eq(current, stale) => {
                *guard = None;
                true
            }
            _ => false,
        }
    }

    /// Force a login round-trip and replace the cached token, even if one
    /// is still cached.
    pub async fn login(&self) -> Result<Token, Error> {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await
    }

    async fn login_locked(&self) -> Result<Token, Error> {
        debug!("logging in at {}", self.login_url);

        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
        });

        let resp = self
            .http
            .post(self.login_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| login_error("login request failed", &e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| login_error("reading login response failed", &e))?;
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {text}"),
            });
        }

        let raw = extract_token(&text).ok_or_else(|| Error::Authentication {
            message: "token not found in login response".into(),
        })?;

        let token: Token = Arc::new(SecretString::from(raw));
        *self.token.write().await = Some(Arc::clone(&token));

        debug!("login successful");
        Ok(token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("login_url", &self.login_url.as_str())
            .field("username", &self.credentials.username)
            .finish_non_exhaustive()
    }
}

fn login_error(context: &str, source: &reqwest::Error) -> Error {
    Error::Authentication {
        message: format!("{context}: {source}"),
    }
}

/// Pull a token out of a login response body.
///
/// JSON bodies are searched structurally; anything that does not parse as
/// JSON is taken verbatim (trimmed) as the token.
pub(crate) fn extract_token(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(s)) => non_empty(&s),
        Ok(value) => find_token(&value, 0),
        Err(_) => non_empty(body),
    }
}

fn find_token(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_TOKEN_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => TOKEN_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str).and_then(non_empty))
            .or_else(|| {
                map.values()
                    .filter(|v| v.is_object() || v.is_array())
                    .find_map(|v| find_token(v, depth + 1))
            }),
        Value::Array(items) => items.iter().find_map(|v| find_token(v, depth + 1)),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
