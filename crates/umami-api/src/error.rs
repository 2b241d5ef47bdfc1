use thiserror::Error;

/// Top-level error type for the `umami-api` crate.
///
/// Covers every failure mode of a Umami request: login, transport,
/// non-success HTTP statuses, response decoding, and cancellation.
/// `umami-core` decides which of these are fatal to a refresh cycle.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed, was unreachable, or its response carried no usable
    /// token.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status, with the raw body for diagnostics.
    #[error("Request failed (HTTP {status}): {body}")]
    Request { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The operation was abandoned because its cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` for a 401 response, the only status that triggers
    /// re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Request { status: 401, .. })
    }
}
