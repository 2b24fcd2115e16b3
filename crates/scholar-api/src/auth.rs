use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Form, Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use scholar_db::Database;
use scholar_db::models::ProfileFields;
use scholar_types::Role;
use scholar_types::api::{
    Claims, CompleteProfileRequest, EmailForm, LoginRequest, LoginResponse, MessageResponse,
    SetPasswordRequest, VerifyTokenForm,
};

use crate::convert;
use crate::middleware::{AuthUser, token_digest};
use crate::{ApiError, AppState, run_db};

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// POST /auth/request-verification: start (or restart) signup for an email.
pub async fn request_verification(
    State(state): State<AppState>,
    Form(form): Form<EmailForm>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&form.email)?;

    let lookup = email.clone();
    let existing = run_db(&state, move |db| db.get_user_by_email(&lookup)).await?;
    if existing.as_ref().is_some_and(|u| u.password.is_some()) {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let code = generate_code();
    let expires_at = (chrono::Utc::now() + state.code_ttl).timestamp();
    {
        let email = email.clone();
        let code = code.clone();
        run_db(&state, move |db| {
            if existing.is_none() {
                db.create_pending_user(&Uuid::new_v4().to_string(), &email)?;
            }
            db.put_verification_code(&email, &code, expires_at)
        })
        .await?;
    }

    state.mailer.send_code(&email, &code)?;
    info!("Verification code issued for {}", email);

    Ok(Json(MessageResponse::new(format!(
        "Verification code sent to {}",
        email
    ))))
}

/// POST /auth/signup/verify-token
pub async fn verify_token(
    State(state): State<AppState>,
    Form(form): Form<VerifyTokenForm>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&form.email)?;
    let token = form.token.trim().to_string();
    let now = chrono::Utc::now().timestamp();

    let verified = run_db(&state, move |db| {
        if !db.consume_verification_code(&email, &token, now)? {
            return Ok(false);
        }
        db.mark_verified(&email)
    })
    .await?;

    if !verified {
        return Err(ApiError::bad_request("Invalid token"));
    }
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// POST /auth/signup/set-password
pub async fn set_password(
    State(state): State<AppState>,
    Json(req): Json<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password != req.confirm_password {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    check_password_strength(&req.password)?;

    let lookup = email.clone();
    let user = run_db(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .filter(|u| u.verified)
        .ok_or_else(|| ApiError::bad_request("Email has not been verified"))?;
    if user.password.is_some() {
        return Err(ApiError::conflict("Password has already been set"));
    }

    let password_hash = hash_password(&req.password)?;
    run_db(&state, move |db| db.set_password(&email, &password_hash)).await?;

    Ok(Json(MessageResponse::new("Password set successfully")))
}

/// POST /auth/signup/complete
pub async fn complete_profile(
    State(state): State<AppState>,
    Json(req): Json<CompleteProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let required = [
        ("Name", &req.name),
        ("Sex", &req.sex),
        ("Mobile phone", &req.mobile_phone),
        ("University name", &req.university_name),
        ("University registration ID", &req.university_registration_id),
        ("Program name", &req.program_name),
        ("Enrolled year", &req.enrolled_year),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    if req.batch_number == 0 {
        return Err(ApiError::bad_request("Batch number is required"));
    }

    let lookup = email.clone();
    let user = run_db(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .filter(|u| u.password.is_some())
        .ok_or_else(|| ApiError::bad_request("Password has not been set"))?;
    // once completed, edits go through the authenticated /profile/info route
    if user.profile_completed {
        return Err(ApiError::conflict("Profile has already been completed"));
    }

    let fields = ProfileFields {
        name: req.name.trim().to_string(),
        sex: req.sex,
        mobile_phone: req.mobile_phone.trim().to_string(),
        university_name: req.university_name,
        university_registration_id: req.university_registration_id,
        program_name: req.program_name,
        enrolled_year: req.enrolled_year,
        enrollment_status: user.profile.enrollment_status,
        batch_number: req.batch_number,
        profile_image: user.profile.profile_image,
    };
    run_db(&state, move |db| db.write_profile(&user.id, &fields, true)).await?;

    info!("Profile completed for {}", email);
    Ok(Json(MessageResponse::new("Profile completed successfully")))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let email = req.email.trim().to_lowercase();
    let user = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;
    let stored = user.password.as_deref().ok_or_else(invalid)?;

    if !verify_password(&req.password, stored)? {
        warn!("Failed login for {}", user.email);
        return Err(invalid());
    }

    let session = convert::session_user(&user)?;
    let token = create_token(&state.jwt_secret, &session.id, &session.email, session.role, state.token_ttl)?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: session,
    }))
}

/// GET /auth/me: the session behind the presented token.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.user_id();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;
    Ok(Json(convert::session_user(&user)?))
}

/// POST /auth/logout: revoke the presented token until it would have expired.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let digest = token_digest(&auth.token);
    let expires_at = auth.claims.exp as i64;
    run_db(&state, move |db| db.revoke_token(&digest, expires_at)).await?;

    info!("User {} logged out", auth.claims.email);
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Create or reset the administrator account. Idempotent.
pub fn seed_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<()> {
    let password_hash = hash_password(password)?;
    db.upsert_account(
        &Uuid::new_v4().to_string(),
        &email.trim().to_lowercase(),
        &password_hash,
        Role::Admin.as_str(),
        "Administrator",
    )?;
    info!("Administrator account ready: {}", email);
    Ok(())
}

pub(crate) fn create_token(
    secret: &str,
    user_id: &Uuid,
    email: &str,
    role: Role,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: *user_id,
        email: email.to_string(),
        role,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub(crate) fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Same rules the portal enforces before submitting.
pub(crate) fn check_password_strength(password: &str) -> Result<(), ApiError> {
    let problem = if password.is_empty() {
        Some("Password is required")
    } else if password.chars().count() < 8 {
        Some("Password must be at least 8 characters long")
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        Some("Password must contain at least one uppercase letter")
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        Some("Password must contain at least one lowercase letter")
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("Password must contain at least one number")
    } else if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        Some("Password must contain at least one special character")
    } else {
        None
    };
    match problem {
        Some(msg) => Err(ApiError::bad_request(msg)),
        None => Ok(()),
    }
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(ApiError::bad_request("Please enter a valid email address"));
    }
    Ok(email)
}

fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(check_password_strength("Str0ng!pass").is_ok());
        for weak in ["", "Sh0rt!", "nouppercase1!", "NOLOWERCASE1!", "NoDigits!!", "NoSpecial123"] {
            assert!(check_password_strength(weak).is_err(), "{} accepted", weak);
        }
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("Str0ng!pass").unwrap();
        assert!(verify_password("Str0ng!pass", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Asha@Example.COM ").unwrap(), "asha@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
    }

    #[test]
    fn test_seed_admin_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed_admin(&db, "admin@example.com", "Adm1n!pass").unwrap();
        seed_admin(&db, "admin@example.com", "Adm1n!pass2").unwrap();

        let user = db.get_user_by_email("admin@example.com").unwrap().unwrap();
        assert_eq!(user.role, "admin");
        assert!(verify_password("Adm1n!pass2", user.password.as_deref().unwrap()).unwrap());
    }

    #[test]
    fn test_token_carries_role() {
        let id = Uuid::new_v4();
        let token = create_token("secret", &id, "a@example.com", Role::Admin, chrono::Duration::hours(1)).unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, id);
        assert_eq!(data.claims.role, Role::Admin);
    }
}
