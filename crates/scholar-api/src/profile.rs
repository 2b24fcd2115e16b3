use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use scholar_types::ProfileUpdate;

use crate::convert;
use crate::middleware::AuthUser;
use crate::{ApiError, AppState, run_db};

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    Ok(Json(convert::profile(&user)?))
}

/// PUT /profile/info: apply a partial update and return the whole profile.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let mut profile = convert::profile(&user)?;
    update.apply(&mut profile);
    if profile.name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    let fields = convert::profile_fields(&profile);
    let user_id = user.id.clone();
    run_db(&state, move |db| db.write_profile(&user_id, &fields, false)).await?;

    info!("Profile updated for {}", user.email);
    Ok(Json(profile))
}
