use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use clinicbot::config::AppConfig;
use clinicbot::db;
use clinicbot::handlers;
use clinicbot::state::{build_llm, AppState};

const SESSION_SWEEP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(slots = ?config.time_slots.labels(), "loaded configuration");

    let conn = db::init_db(&config.database_url)?;
    let llm = build_llm(&config)?;
    let state = Arc::new(AppState::new(config.clone(), conn, llm));

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_SWEEP_SECS));
        loop {
            interval.tick().await;
            match sweeper.sessions.expire_old() {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired idle chat sessions"),
                Err(e) => tracing::warn!(error = %e, "failed to expire chat sessions"),
            }
        }
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
