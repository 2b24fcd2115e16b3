pub mod announcements;
pub mod auth;
pub mod convert;
pub mod documents;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod payments;
pub mod profile;
pub mod results;
pub mod settings;
pub mod storage;

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};
use scholar_db::Database;
use tracing::error;

pub use error::ApiError;

use crate::mailer::CodeMailer;
use crate::middleware::{require_admin, require_auth};
use crate::storage::FileStorage;

/// Uploads are capped at 5 MB by the handler; the body limit leaves room for
/// multipart framing so the handler can answer with a readable message.
const MAX_REQUEST_BODY: usize = 6 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Per-user result PDFs.
    pub storage: FileStorage,
    /// Shared mentorship documents such as resume templates.
    pub documents: FileStorage,
    pub mailer: Arc<dyn CodeMailer>,
    pub token_ttl: chrono::Duration,
    pub code_ttl: chrono::Duration,
}

/// Build the full HTTP surface: `/health` plus everything under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/request-verification", post(auth::request_verification))
        .route("/auth/signup/verify-token", post(auth::verify_token))
        .route("/auth/signup/set-password", post(auth::set_password))
        .route("/auth/signup/complete", post(auth::complete_profile))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/profile", get(profile::get_profile))
        .route("/profile/info", put(profile::update_profile))
        .route("/payment/history", get(payments::history))
        .route("/payment/submit-fee", post(payments::submit_fee))
        .route("/payment/submit-nhif", post(payments::submit_nhif))
        .route("/resultpdf", post(results::upload))
        .route("/resultpdf/list", get(results::list))
        .route(
            "/resultpdf/{file_name}",
            get(results::download).delete(results::delete),
        )
        .route("/announcements/user", get(announcements::list_for_user))
        .route("/announcements/{id}/read", patch(announcements::mark_read))
        .route("/settings/preferences", get(settings::get_preferences))
        .route(
            "/settings/update-notifications",
            post(settings::update_notifications),
        )
        .route("/settings/security", post(settings::change_password))
        .route("/documents/resume-templates", get(documents::list_templates))
        .route("/documents/download/{id}", get(documents::download))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/payments/{id}/status", patch(payments::update_status))
        .route("/announcements/admin", post(announcements::create))
        .route("/documents/admin/upload", post(documents::upload))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
}

/// Run a database call on the blocking pool.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("background task failed"))
        })?
        .map_err(ApiError::Internal)
}
