mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use hoaxify_api::auth::{AppState, AppStateInner};
use hoaxify_api::mail::LogMailer;
use hoaxify_api::storage::DiskStorage;
use hoaxify_db::Database;
use hoaxify_lifecycle::{AttachmentReaper, Clock, Gate, SessionManager, SystemClock};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hoaxify=debug,hoaxify_lifecycle=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let lifecycle = &config.lifecycle;

    let db = Arc::new(Database::open(&config.db_path)?);
    let attachments = Arc::new(DiskStorage::new(config.upload_dir.join("attachment")).await?);
    let images = Arc::new(DiskStorage::new(config.upload_dir.join("profile")).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sessions = Arc::new(SessionManager::new(db.clone(), clock.clone(), lifecycle.session_ttl));
    let reaper = Arc::new(AttachmentReaper::new(
        db.clone(),
        attachments.clone(),
        clock.clone(),
        lifecycle.attachment_grace,
    ));

    let token_sweep = sessions.start_sweep(lifecycle.token_sweep_interval);
    let attachment_sweep = reaper.start_sweep(lifecycle.attachment_sweep_interval);

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: sessions.clone(),
        reaper,
        gate: Gate::new(sessions),
        attachments,
        images,
        mailer: Arc::new(LogMailer),
        clock,
    });

    let app = hoaxify_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Hoaxify listening on {}", addr);
    info!(
        "Session TTL {} h, attachment grace {} h",
        lifecycle.session_ttl.num_hours(),
        lifecycle.attachment_grace.num_hours()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token_sweep.stop().await;
    attachment_sweep.stop().await;
    info!("Background sweeps stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
