mod app;
mod cache;
mod config;
mod handlers;
mod notifier;
mod service;
mod source;
mod state;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use listenfd::ListenFd;
use tokio::{net::TcpListener, signal, sync::broadcast};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sheetsync_core::schedule::{GridFetcher, MonthBlockParser};

use crate::{
    app::create_app,
    config::Config,
    notifier::{run_notifier, LogSink, NotificationSink, TelegramSink},
    service::{ScheduleService, ServiceOptions},
    source::{demo_grid, SheetsFetcher, StaticGridFetcher},
    state::AppState,
};

/// SheetSync - Serve a spreadsheet schedule and notify admins about changes
#[derive(Parser, Debug)]
#[command(name = "sheetsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "8001", env = "PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetsync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let service = Arc::new(ScheduleService::new(
        grid_fetcher(&config),
        Arc::new(MonthBlockParser::new(config.schedule_year)),
        ServiceOptions::from(&config),
    ));
    service.start();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let notifier = config.notify_interval().map(|interval| {
        tokio::spawn(run_notifier(
            Arc::clone(&service),
            notification_sink(&config),
            interval,
            shutdown_tx.subscribe(),
        ))
    });

    let app = create_app(AppState::new(Arc::clone(&service)), &config);

    // Auto-reload support via listenfd
    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // If we are given a tcp listener on listen fd 0, use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // Otherwise fall back to CLI-specified host:port
        None => {
            let addr = format!("{}:{}", cli.host, cli.port);
            TcpListener::bind(&addr).await?
        }
    };

    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await;

    // Also reached when the server fails, so stop the background tasks here.
    let _ = shutdown_tx.send(());
    if let Some(notifier) = notifier {
        if let Err(e) = notifier.await {
            tracing::warn!(error = %e, "Notifier task ended abnormally");
        }
    }
    service.stop().await;

    served?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Sheets source when a spreadsheet is configured, the demo grid otherwise.
fn grid_fetcher(config: &Config) -> Arc<dyn GridFetcher> {
    match &config.spreadsheet_id {
        Some(spreadsheet_id) => {
            tracing::info!(
                spreadsheet_id = %spreadsheet_id,
                sheet = %config.sheet_name,
                year = config.schedule_year,
                "Using Google Sheets source"
            );
            Arc::new(SheetsFetcher::new(
                config.sheets_base_url.clone(),
                spreadsheet_id.clone(),
                config.sheet_name.clone(),
                config.google_api_key.clone(),
            ))
        }
        None => {
            tracing::warn!("SPREADSHEET_ID is not set, serving the demo schedule");
            Arc::new(StaticGridFetcher::new(demo_grid(Utc::now().date_naive())))
        }
    }
}

/// Telegram when a bot token is configured, the log otherwise.
fn notification_sink(config: &Config) -> Arc<dyn NotificationSink> {
    match &config.tg_token {
        Some(token) => {
            tracing::info!(admins = config.admin_ids.len(), "Notifying admins via Telegram");
            Arc::new(TelegramSink::new(
                config.telegram_base_url.clone(),
                token.clone(),
                config.admin_ids.clone(),
            ))
        }
        None => {
            tracing::info!("TG_TOKEN is not set, notifications go to the log");
            Arc::new(LogSink)
        }
    }
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM) and notify background tasks.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    let _ = shutdown_tx.send(());
}
