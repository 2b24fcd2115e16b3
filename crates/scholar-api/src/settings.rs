use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use scholar_types::NotificationPreferences;
use scholar_types::api::{ChangePasswordRequest, MessageResponse};

use crate::auth::{check_password_strength, hash_password, verify_password};
use crate::convert;
use crate::middleware::AuthUser;
use crate::{ApiError, AppState, run_db};

/// GET /settings/preferences: all switches on until the user changes them.
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let stored = run_db(&state, move |db| db.get_preferences(&id)).await?;
    Ok(Json(convert::preferences(stored.unwrap_or_default())))
}

/// POST /settings/update-notifications: the body's `version` must match the
/// stored one; the response carries the new version.
pub async fn update_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(prefs): Json<NotificationPreferences>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let row = convert::preferences_row(&prefs);
    let expected = prefs.version;
    let stored = run_db(&state, move |db| db.update_preferences(&id, &row, expected))
        .await?
        .ok_or_else(|| {
            ApiError::conflict("Preferences were changed elsewhere. Please try again.")
        })?;

    info!("Notification preferences updated for {} (v{})", auth.claims.email, stored.version);
    Ok(Json(convert::preferences(stored)))
}

/// POST /settings/security: change password. A wrong current password is a
/// 400 so the portal does not treat it as an expired session.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;

    let current_ok = match user.password.as_deref() {
        Some(stored) => verify_password(&req.current_password, stored)?,
        None => false,
    };
    if !current_ok {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    if req.new_password == req.current_password {
        return Err(ApiError::bad_request(
            "New password must be different from the current password",
        ));
    }
    check_password_strength(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    let user_id = user.id.clone();
    run_db(&state, move |db| db.update_password_by_id(&user_id, &password_hash)).await?;

    info!("Password changed for {}", user.email);
    Ok(Json(MessageResponse::new("Password updated successfully")))
}
