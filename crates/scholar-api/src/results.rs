use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};

use scholar_db::models::ResultRow;
use scholar_types::ResultStatus;

use crate::convert;
use crate::middleware::AuthUser;
use crate::{ApiError, AppState, run_db};

/// 5 MB upload limit for result documents
pub const MAX_RESULT_SIZE: usize = 5 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";

/// POST /resultpdf: multipart upload, field `result`. A document with the
/// same file name replaces the previous one.
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("result") {
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

    let is_pdf = file_name.to_ascii_lowercase().ends_with(".pdf")
        && content_type.as_deref().is_none_or(|ct| ct == PDF_MIME);
    if !is_pdf {
        return Err(ApiError::bad_request("Only PDF files are allowed"));
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("The selected file is empty"));
    }
    if data.len() > MAX_RESULT_SIZE {
        return Err(ApiError::PayloadTooLarge(
            "File size should be less than 5MB".into(),
        ));
    }

    let user_id = auth.user_id();
    state
        .storage
        .write_file(&user_id, &file_name, &data)
        .await
        .map_err(|e| {
            error!("Failed to store result {} for {}: {}", file_name, user_id, e);
            ApiError::Internal(e)
        })?;

    let row = ResultRow {
        user_id,
        file_name,
        file_size: data.len() as u64,
        file_type: PDF_MIME.to_string(),
        status: ResultStatus::Submitted.as_str().to_string(),
        uploaded_at: convert::timestamp(chrono::Utc::now()),
    };
    let result = convert::uploaded_result(&row)?;
    run_db(&state, move |db| db.upsert_result(&row)).await?;

    info!("Result {} uploaded ({} bytes)", result.file_name, result.file_size);
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /resultpdf/list
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let rows = run_db(&state, move |db| db.list_results(&id)).await?;
    let results = rows
        .iter()
        .map(convert::uploaded_result)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(results))
}

/// GET /resultpdf/{file_name}: the stored document as a PDF attachment.
pub async fn download(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user_id();
    let (uid, name) = (user_id.clone(), file_name.clone());
    let row = run_db(&state, move |db| db.get_result(&uid, &name))
        .await?
        .ok_or_else(|| ApiError::not_found("Result not found"))?;

    let data = state.storage.read_file(&user_id, &row.file_name).await?;
    let disposition = format!("attachment; filename=\"{}\"", row.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, row.file_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

/// DELETE /resultpdf/{file_name}
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user_id();
    let (uid, name) = (user_id.clone(), file_name.clone());
    let removed = run_db(&state, move |db| db.delete_result(&uid, &name)).await?;
    if !removed {
        return Err(ApiError::not_found("Result not found"));
    }

    state.storage.delete_file(&user_id, &file_name).await?;
    info!("Result {} deleted", file_name);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File size should be less than 5MB".into())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// Keep only the final path component and refuse names that cannot be used
/// as a single URL segment.
pub(crate) fn sanitize_file_name(raw: Option<&str>) -> Result<String, ApiError> {
    let name = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c.is_control() || matches!(c, '?' | '#' | '%' | '"'));
    if bad {
        return Err(ApiError::bad_request("Invalid file name"));
    }
    Ok(name.to_string())
}
