use async_trait::async_trait;

use scholar_types::SessionUser;
use scholar_types::api::{
    CompleteProfileRequest, EmailForm, LoginRequest, LoginResponse, MessageResponse,
    SetPasswordRequest, VerifyTokenForm,
};

use crate::api::HttpClient;
use crate::error::ClientError;

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Issue (or re-issue) a signup verification code.
    async fn request_verification(&self, email: &str) -> Result<MessageResponse, ClientError>;
    async fn verify_token(&self, email: &str, token: &str) -> Result<MessageResponse, ClientError>;
    async fn set_password(&self, req: &SetPasswordRequest) -> Result<MessageResponse, ClientError>;
    async fn complete_profile(
        &self,
        req: &CompleteProfileRequest,
    ) -> Result<MessageResponse, ClientError>;
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError>;
    async fn current_user(&self) -> Result<SessionUser, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn request_verification(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let form = EmailForm {
            email: email.to_string(),
        };
        self.post_form("/auth/request-verification", &form).await
    }

    async fn verify_token(&self, email: &str, token: &str) -> Result<MessageResponse, ClientError> {
        let form = VerifyTokenForm {
            email: email.to_string(),
            token: token.to_string(),
        };
        self.post_form("/auth/signup/verify-token", &form).await
    }

    async fn set_password(&self, req: &SetPasswordRequest) -> Result<MessageResponse, ClientError> {
        self.post_json("/auth/signup/set-password", req).await
    }

    async fn complete_profile(
        &self,
        req: &CompleteProfileRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.post_json("/auth/signup/complete", req).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_json("/auth/login", &req).await
    }

    async fn current_user(&self) -> Result<SessionUser, ClientError> {
        self.get_json("/auth/me").await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let _: MessageResponse = self.post_json("/auth/logout", &serde_json::json!({})).await?;
        Ok(())
    }
}
