use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};

use scholar_db::models::DocumentRow;

use crate::convert;
use crate::results::{MAX_RESULT_SIZE, multipart_error, sanitize_file_name};
use crate::{ApiError, AppState, run_db};

/// Storage directory shared by every resume template.
const TEMPLATE_OWNER: &str = "resume-templates";

const DEFAULT_MIME: &str = "application/octet-stream";

/// POST /documents/admin/upload: multipart field `file`, any type.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| ApiError::bad_request("Please select a file to upload"))?;
    let file_name = sanitize_file_name(file_name.as_deref())?;
    if data.is_empty() {
        return Err(ApiError::bad_request("The selected file is empty"));
    }
    if data.len() > MAX_RESULT_SIZE {
        return Err(ApiError::PayloadTooLarge(
            "File size should be less than 5MB".into(),
        ));
    }

    let now = chrono::Utc::now();
    let stored_name = format!("{}_{}", now.timestamp_millis(), file_name);
    state
        .documents
        .write_file(TEMPLATE_OWNER, &stored_name, &data)
        .await
        .map_err(|e| {
            error!("Failed to store document {}: {}", stored_name, e);
            ApiError::Internal(e)
        })?;

    let mut row = DocumentRow {
        id: 0,
        file_name,
        stored_name,
        file_type: content_type.unwrap_or_else(|| DEFAULT_MIME.to_string()),
        file_size: data.len() as u64,
        uploaded_at: convert::timestamp(now),
    };
    let insert = row.clone();
    row.id = run_db(&state, move |db| db.insert_document(&insert)).await?;

    info!("Document {} uploaded as #{}", row.file_name, row.id);
    Ok((StatusCode::CREATED, Json(convert::document(&row)?)))
}

/// GET /documents/resume-templates
pub async fn list_templates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_documents()).await?;
    let docs = rows
        .iter()
        .map(convert::document)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(docs))
}

/// GET /documents/download/{id}
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_document(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    let data = state.documents.read_file(TEMPLATE_OWNER, &row.stored_name).await?;
    let disposition = format!("attachment; filename=\"{}\"", row.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, row.file_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}
