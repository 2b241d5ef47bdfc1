// Umami API HTTP client
//
// Wraps `reqwest::Client` with bearer authentication through the shared
// `Session`, the one-shot re-login on 401, status mapping and JSON
// decoding. Endpoint methods live in `websites.rs` as inherent methods
// so this module stays focused on transport mechanics.

use chrono::Duration;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::session::{Credentials, Session, Token};
use crate::transport::TransportConfig;

/// Length of the trailing window used by the stats and metrics endpoints.
pub const DEFAULT_STATS_WINDOW_DAYS: i64 = 30;

/// How many characters of a response body are kept in decode errors.
const BODY_PREVIEW_LEN: usize = 200;

/// Join `path` onto the API root, tolerating a trailing slash on the root
/// and a leading slash on the path.
pub(crate) fn endpoint(base_url: &Url, path: &str) -> Result<Url, Error> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}")).map_err(Error::InvalidUrl)
}

/// Authenticated client for a single Umami instance.
///
/// Safe to share across tasks; all methods take `&self`.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    stats_window: Duration,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the Umami root (e.g. `https://analytics.example.com`);
    /// API paths are appended below it.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url, credentials)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let session = Session::new(http.clone(), &base_url, credentials)?;
        Ok(Self {
            http,
            base_url,
            session,
            stats_window: Duration::days(DEFAULT_STATS_WINDOW_DAYS),
        })
    }

    /// Override the trailing window used by stats and metrics queries.
    pub fn with_stats_window(mut self, window: Duration) -> Self {
        self.stats_window = window;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats_window(&self) -> Duration {
        self.stats_window
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated request and decode the JSON response.
    ///
    /// A 401 invalidates the token, logs in again and resends once. A
    /// second 401, like any other failure, is returned to the caller.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let url = endpoint(&self.base_url, path)?;
        let token = self.session.ensure().await?;

        let resp = self.send(&method, &url, query, body, &token).await?;
        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("token rejected for {method} {url}; logging in again");
            self.session.invalidate_if(&token).await;
            let token = self.session.ensure().await?;
            self.send(&method, &url, query, body, &token).await?
        } else {
            resp
        };

        Self::decode(resp).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &Token,
    ) -> Result<reqwest::Response, Error> {
        debug!("{method} {url}");

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token.expose_secret());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(Error::Transport)
    }

    /// Map error statuses to `Error::Request` and decode success bodies.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Request {
                status: status.as_u16(),
                body,
            });
        }

        trace!(bytes = body.len(), "decoding response");
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
                Err(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                })
            }
        }
    }
}
