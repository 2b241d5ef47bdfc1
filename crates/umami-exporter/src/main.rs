mod cli;
mod error;
mod metrics;
mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use umami_api::ApiClient;
use umami_core::{CycleStatus, Refresher, Scheduler};

use crate::cli::{Cli, LogFormat};
use crate::error::ExporterError;
use crate::metrics::PrometheusSink;
use crate::server::AppState;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), ExporterError> {
    let config = umami_config::load(cli.config.as_deref())?;
    info!(
        url = %config.url,
        port = config.port,
        interval = ?config.refresh_interval,
        concurrency = config.concurrency,
        "starting umami exporter"
    );

    let client = ApiClient::new(
        config.url.clone(),
        config.credentials.clone(),
        &config.transport(),
    )
    .map_err(ExporterError::Client)?
    .with_stats_window(config.stats_window);

    let sink = Arc::new(PrometheusSink::new()?);
    let status = Arc::new(CycleStatus::new());
    let refresher = Refresher::new(
        client,
        Arc::clone(&sink),
        Arc::clone(&status),
        config.refresh(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind { addr, source })?;
    info!(%addr, "serving /metrics and /healthz");

    let scheduler = Scheduler::new(refresher, config.refresh_interval).spawn(cancel.clone());
    let served = server::serve(listener, AppState::new(sink, status), cancel.clone()).await;

    // A failed server takes the scheduler down with it.
    cancel.cancel();
    if let Err(e) = scheduler.await {
        warn!(error = %e, "scheduler task ended abnormally");
    }
    served.map_err(ExporterError::Serve)?;

    info!("shutdown complete");
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGTERM"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGINT"),
            () = cancel.cancelled() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
            () = cancel.cancelled() => return,
        }
    }

    cancel.cancel();
}
