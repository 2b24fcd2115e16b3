use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use scholar_db::models::PaymentRow;
use scholar_types::api::{MessageResponse, PaymentSubmission, UpdatePaymentStatusRequest};
use scholar_types::{PaymentKind, PaymentStatus};

use crate::convert;
use crate::middleware::AuthUser;
use crate::{ApiError, AppState, run_db};

/// GET /payment/history: newest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let rows = run_db(&state, move |db| db.list_payments(&id)).await?;
    let payments = rows
        .iter()
        .map(convert::payment)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(payments))
}

/// POST /payment/submit-fee
pub async fn submit_fee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<PaymentSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    submit(state, auth, PaymentKind::University, req.fee_control_number, req.description).await
}

/// POST /payment/submit-nhif
pub async fn submit_nhif(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<PaymentSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    submit(state, auth, PaymentKind::Nhif, req.nhif_control_number, req.description).await
}

async fn submit(
    state: AppState,
    auth: AuthUser,
    kind: PaymentKind,
    control_number: Option<String>,
    description: Option<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let control_number = control_number
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Control number is required"))?;
    if !is_control_number(&control_number) {
        return Err(ApiError::bad_request(
            "Please enter a valid 12-digit control number",
        ));
    }

    let row = PaymentRow {
        id: Uuid::new_v4().to_string(),
        user_id: auth.user_id(),
        kind: kind.as_str().to_string(),
        control_number,
        status: PaymentStatus::Pending.as_str().to_string(),
        description: Some(description.unwrap_or_else(|| format!("{} payment", kind.label()))),
        created_at: convert::timestamp(chrono::Utc::now()),
    };
    run_db(&state, move |db| db.insert_payment(&row)).await?;

    info!("{} control number submitted by {}", kind.label(), auth.claims.email);
    let message = match kind {
        PaymentKind::University => "University fee control number submitted successfully",
        PaymentKind::Nhif => "Nhif control number submitted successfully",
    };
    Ok(Json(MessageResponse::new(message)))
}

/// PATCH /admin/payments/{id}/status: move a payment along its lifecycle.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = id.to_string();
    let row = run_db(&state, move |db| db.get_payment(&payment_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    let current: PaymentStatus = row.status.parse().map_err(anyhow::Error::from)?;
    if !current.can_transition_to(req.status) {
        return Err(ApiError::conflict(format!(
            "Cannot change payment status from {} to {}",
            current.as_str(),
            req.status.as_str()
        )));
    }

    let payment_id = row.id.clone();
    let to = req.status.as_str();
    let updated = run_db(&state, move |db| {
        if !db.update_payment_status(&payment_id, current.as_str(), to)? {
            return Ok(None);
        }
        db.get_payment(&payment_id)
    })
    .await?
    .ok_or_else(|| ApiError::conflict("Payment status changed concurrently"))?;

    info!("Payment {} moved {} -> {}", id, current.as_str(), to);
    Ok(Json(convert::payment(&updated)?))
}

fn is_control_number(s: &str) -> bool {
    s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit())
}
