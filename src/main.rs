use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod api;
mod backend;
mod cli;
mod config;
mod error;
mod ops;
mod session;

use api::handlers::Api;
use backend::sftp::SftpConnection;
use backend::RemoteConnection;
use cli::args::Cli;
use config::settings::Settings;
use config::types::Verbosity;
use error::GateError;
use session::{Session, SessionCell};

fn main() {
    let cli = Cli::parse();

    // Convert CLI flags to verbosity level
    let verbosity = Verbosity::from((cli.quiet, cli.verbose));

    // RUST_LOG env var overrides CLI flags
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.as_tracing_filter())),
        )
        .with_writer(std::io::stderr) // Keep stdout clean for output
        .init();

    tracing::debug!("Verbosity level: {:?}", verbosity);

    if let Err(err) = run(cli) {
        display_error(&err);
        std::process::exit(1);
    }
}

/// Validate settings, connect, then serve the API until shutdown.
fn run(cli: Cli) -> Result<(), GateError> {
    let settings = Settings::from_cli(cli)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| GateError::Config(format!("Failed to start async runtime: {}", e)))?;
    let listener = runtime.block_on(bind(settings.listen))?;

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        user = %settings.user,
        "Connecting"
    );
    let connection = SftpConnection::open(
        &settings.host,
        settings.port,
        &settings.user,
        &settings.credential,
        &settings.host_keys,
    )?;
    tracing::info!("Connected to {}", connection.info());

    let sessions = SessionCell::new();
    let session = sessions.initialize(Arc::new(connection), settings.download_dir.clone());
    tracing::info!("Downloads go to {}", session.download_dir().display());

    runtime.block_on(serve_until_shutdown(listener, session));

    if let Some(session) = sessions.current() {
        session.close();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, GateError> {
    TcpListener::bind(addr).await.map_err(|e| {
        GateError::Config(format!(
            "Failed to bind {}: {}. Try a different address with --listen.",
            addr, e
        ))
    })
}

/// Serve until a `shutdown` request, SIGINT/Ctrl-C or SIGTERM.
async fn serve_until_shutdown(listener: TcpListener, session: Arc<Session>) {
    let (shutdown_tx, _) = watch::channel(false);
    let api = Arc::new(Api::new(session, shutdown_tx));

    match listener.local_addr() {
        Ok(addr) => tracing::info!("API listening on {}", addr),
        Err(e) => tracing::warn!("API listening on unknown address: {}", e),
    }

    let signal_api = Arc::clone(&api);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_api.begin_shutdown();
    });

    api::server::serve(listener, api).await;
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Never resolves if no handler could be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to install signal handlers: {}", e);
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C"),
        Err(e) => {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending().await
        }
    }
}

/// Display a GateError with optional suggestion hint to stderr.
fn display_error(err: &GateError) {
    eprintln!("error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  hint: {}", suggestion);
    }
}
