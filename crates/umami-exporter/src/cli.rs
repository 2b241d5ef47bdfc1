//! Clap derive structures for the `umami-exporter` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// umami-exporter -- Umami web analytics as Prometheus metrics
#[derive(Debug, Parser)]
#[command(
    name = "umami-exporter",
    version,
    about = "Export Umami web analytics as Prometheus metrics",
    long_about = "Periodically reads website stats, live visitors and metric breakdowns\n\
        from an Umami instance and serves them on /metrics.\n\n\
        Connection settings come from UMAMI_* environment variables or a TOML file."
)]
pub struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(long, short = 'c', env = "EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, env = "EXPORTER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
