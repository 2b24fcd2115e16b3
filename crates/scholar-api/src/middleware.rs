use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sha2::{Digest, Sha256};
use tracing::debug;

use scholar_types::Role;
use scholar_types::api::Claims;

use crate::{ApiError, AppState, run_db};

/// The authenticated caller, inserted as a request extension by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

impl AuthUser {
    pub fn user_id(&self) -> String {
        self.claims.sub.to_string()
    }
}

/// Tokens are stored in the revocation list by digest, never in the clear.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;
    let token = bearer.token().to_string();

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;

    let digest = token_digest(&token);
    if run_db(&state, move |db| db.is_token_revoked(&digest)).await? {
        return Err(ApiError::Unauthorized("Token has been revoked".into()));
    }

    req.extensions_mut().insert(AuthUser {
        claims: token_data.claims,
        token,
    });
    Ok(next.run(req).await)
}

/// Must run after [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .is_some_and(|u| u.claims.role == Role::Admin);
    if !is_admin {
        return Err(ApiError::Forbidden("Administrator access required".into()));
    }
    Ok(next.run(req).await)
}
