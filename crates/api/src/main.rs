use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use sessiongate_infra::config::AppConfig;
use sessiongate_infra::db;
use tokio::sync::Notify;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Serve HTTP until interrupted.
    Start,
    /// Create the database schema, then exit.
    Prepare,
}

#[derive(Debug, Parser)]
#[command(name = "sessiongate", about = "Session-authenticated HTTP service")]
struct Cli {
    #[arg(long, value_enum, ignore_case = true, default_value = "start")]
    mode: Mode,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;

    sessiongate_observability::init(&config.logging).context("failed to initialize logging")?;

    match cli.mode {
        Mode::Prepare => prepare(&config).await,
        Mode::Start => start(&config).await,
    }
}

async fn prepare(config: &AppConfig) -> anyhow::Result<()> {
    let database = config
        .database
        .as_ref()
        .context("prepare mode requires DATABASE_URL or PG_HOST")?;

    let pool = db::connect(database, config.backend_timeout)
        .await
        .context("failed to connect to postgres")?;
    db::bootstrap_schema(&pool)
        .await
        .context("schema bootstrap failed")?;
    pool.close().await;

    tracing::info!("database prepared");
    Ok(())
}

async fn start(config: &AppConfig) -> anyhow::Result<()> {
    let services = sessiongate_api::app::services::build_services(config).await?;
    let app = sessiongate_api::app::build_app(Arc::new(services));

    let bind_addr = config.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = Arc::clone(&stopping);
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .into_future();

    // In-flight requests get a bounded window to finish once a signal arrives.
    tokio::select! {
        result = server => result.context("server error")?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "shutdown window elapsed; dropping open connections"
            );
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received terminate signal, initiating graceful shutdown");
        }
    }
}
