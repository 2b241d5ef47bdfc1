//! Top-level error type with miette diagnostics.

use std::net::SocketAddr;

use miette::Diagnostic;
use thiserror::Error;

use umami_config::ConfigError;

pub mod exit_code {
    pub const CONFIG: i32 = 1;
    pub const RUNTIME: i32 = 2;
}

#[derive(Debug, Error, Diagnostic)]
pub enum ExporterError {
    #[error(transparent)]
    #[diagnostic(
        code(umami_exporter::config),
        help(
            "UMAMI_URL, UMAMI_USERNAME and UMAMI_PASSWORD are required.\n\
             Settings can also come from a TOML file passed with --config."
        )
    )]
    Config(#[from] ConfigError),

    #[error("failed to build the Umami HTTP client")]
    #[diagnostic(
        code(umami_exporter::client),
        help("Check UMAMI_URL and, if set, UMAMI_CA_CERT.")
    )]
    Client(#[source] umami_api::Error),

    #[error("failed to register metrics")]
    #[diagnostic(code(umami_exporter::metrics))]
    Metrics(#[from] prometheus::Error),

    #[error("could not listen on {addr}")]
    #[diagnostic(
        code(umami_exporter::bind),
        help("Another process may own the port; pick one with EXPORTER_PORT.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed")]
    #[diagnostic(code(umami_exporter::serve))]
    Serve(#[source] std::io::Error),
}

impl ExporterError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::RUNTIME,
        }
    }
}
