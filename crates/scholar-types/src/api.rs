use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PaymentStatus, Role, SessionUser};

// -- JWT Claims --

/// JWT claims issued by the login endpoint and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: SessionUser,
}

/// Url-encoded body of `request-verification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailForm {
    pub email: String,
}

/// Url-encoded body of `signup/verify-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenForm {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProfileRequest {
    pub email: String,
    pub name: String,
    pub sex: String,
    pub mobile_phone: String,
    pub university_name: String,
    #[serde(rename = "universityRegistrationID")]
    pub university_registration_id: String,
    pub program_name: String,
    pub enrolled_year: String,
    pub batch_number: u32,
}

// -- Payments --

/// Either `feeControlNumber` or `nhifControlNumber` is set, depending on the
/// endpoint it is posted to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_control_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nhif_control_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: PaymentStatus,
}

// -- Settings --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// -- Announcements --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnnouncementQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    10
}

impl Default for AnnouncementQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_page_size(),
        }
    }
}

// -- Generic --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
