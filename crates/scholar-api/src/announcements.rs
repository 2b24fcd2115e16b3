use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use scholar_db::models::AnnouncementRow;
use scholar_types::AnnouncementPage;
use scholar_types::api::{AnnouncementQuery, CreateAnnouncementRequest};

use crate::convert;
use crate::middleware::AuthUser;
use crate::{ApiError, AppState, run_db};

const MAX_PAGE_SIZE: u32 = 100;

/// GET /announcements/user?page&size: newest first, with the caller's read flag.
pub async fn list_for_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<AnnouncementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let size = query.size.clamp(1, MAX_PAGE_SIZE);
    let offset = u64::from(query.page) * u64::from(size);
    let user_id = auth.user_id();

    let (rows, total) = run_db(&state, move |db| {
        let rows = db.list_announcements_for_user(&user_id, size, offset)?;
        Ok((rows, db.count_announcements()?))
    })
    .await?;

    let announcements = rows
        .iter()
        .map(|(row, read)| convert::announcement(row, *read))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(AnnouncementPage {
        announcements,
        page: query.page,
        size,
        total,
    }))
}

/// PATCH /announcements/{id}/read: idempotent.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let announcement_id = id.to_string();
    let user_id = auth.user_id();
    let found = run_db(&state, move |db| {
        if !db.announcement_exists(&announcement_id)? {
            return Ok(false);
        }
        db.mark_announcement_read(&announcement_id, &user_id)?;
        Ok(true)
    })
    .await?;

    if !found {
        return Err(ApiError::not_found("Announcement not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /announcements/admin
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::bad_request("Title and content are required"));
    }

    let sender_id = auth.user_id();
    let lookup = sender_id.clone();
    let sender = run_db(&state, move |db| db.get_user_by_id(&lookup))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
    let sender_name = convert::session_user(&sender)?.name;

    let row = AnnouncementRow {
        id: Uuid::new_v4().to_string(),
        title,
        content,
        sender_id,
        sender_name,
        created_at: convert::timestamp(chrono::Utc::now()),
    };
    let announcement = convert::announcement(&row, false)?;
    run_db(&state, move |db| db.insert_announcement(&row)).await?;

    info!("Announcement '{}' posted by {}", announcement.title, auth.claims.email);
    Ok((StatusCode::CREATED, Json(announcement)))
}
