//! Async client for the Umami analytics API.
//!
//! - **[`Session`]** owns the bearer token: lazy login, coalesced
//!   re-login, and token discovery across the login response shapes
//!   Umami releases have used.
//! - **[`ApiClient`]** sends authenticated requests, re-authenticates
//!   exactly once on a 401, and exposes the website endpoints the
//!   exporter reads (listing, stats, active visitors, metric breakdowns).
//! - **[`models`]** holds the wire types.

pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;
mod websites;

pub use client::{ApiClient, DEFAULT_STATS_WINDOW_DAYS};
pub use error::Error;
pub use models::{
    ActiveVisitors, MetricEntry, MetricType, StatValue, TimeWindow, Website, WebsiteStats,
};
pub use session::{Credentials, Session, Token};
pub use transport::{TlsMode, TransportConfig};
pub use websites::WEBSITE_PAGE_SIZE;
