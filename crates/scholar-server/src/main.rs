mod cleanup;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use scholar_api::mailer::LogMailer;
use scholar_api::storage::FileStorage;
use scholar_api::{AppState, AppStateInner};
use scholar_db::Database;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholar_server=debug,scholar_api=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("SCHOLAR_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: SCHOLAR_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path: PathBuf = std::env::var("SCHOLAR_DB_PATH")
        .unwrap_or_else(|_| "scholar.db".into())
        .into();
    let host = std::env::var("SCHOLAR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SCHOLAR_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;
    let storage_dir: PathBuf = std::env::var("SCHOLAR_STORAGE_DIR")
        .unwrap_or_else(|_| "./result-storage".into())
        .into();
    let document_dir: PathBuf = std::env::var("SCHOLAR_DOCUMENT_DIR")
        .unwrap_or_else(|_| "./document-storage".into())
        .into();
    let token_ttl_hours: i64 = env_number("SCHOLAR_TOKEN_TTL_HOURS", 24);
    let code_ttl_minutes: i64 = env_number("SCHOLAR_CODE_TTL_MINUTES", 15);

    // Init database and storage
    let db = Database::open(&db_path)?;
    let storage = FileStorage::new(storage_dir).await?;
    let documents = FileStorage::new(document_dir).await?;

    match (
        std::env::var("SCHOLAR_ADMIN_EMAIL"),
        std::env::var("SCHOLAR_ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => scholar_api::auth::seed_admin(&db, &email, &password)?,
        (Ok(_), Err(_)) => warn!("SCHOLAR_ADMIN_EMAIL set without SCHOLAR_ADMIN_PASSWORD; no admin seeded"),
        _ => {}
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        storage,
        documents,
        mailer: Arc::new(LogMailer),
        token_ttl: chrono::Duration::hours(token_ttl_hours),
        code_ttl: chrono::Duration::minutes(code_ttl_minutes),
    });

    // Background cleanup task (runs every hour)
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), 3600));

    let app = scholar_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Scholar portal server listening on {}", addr);
    info!(
        "Tokens valid for {}h, verification codes for {}min",
        token_ttl_hours, code_ttl_minutes
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn env_number(key: &str, default: i64) -> i64 {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!("{} is not a number ('{}'), using {}", key, v, default);
            default
        }),
        Err(_) => default,
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
