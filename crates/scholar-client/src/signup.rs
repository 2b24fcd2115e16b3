//! Account creation: verify an email with a one-time code, choose a password,
//! then fill in the scholar profile.
//!
//! The email being registered travels in an explicit [`SignupContext`] that
//! the caller keeps between steps and hands to [`SignupFlow::resume`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use scholar_types::api::{CompleteProfileRequest, SetPasswordRequest};

use crate::error::ClientError;
use crate::routes::Route;
use crate::services::AuthApi;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignupStage {
    AwaitingVerification,
    EmailVerified,
    PasswordSet,
    ProfileCompleted,
}

impl SignupStage {
    fn ahead_message(&self) -> &'static str {
        match self {
            SignupStage::AwaitingVerification => "Please verify your email first",
            SignupStage::EmailVerified => "Please set your password first",
            SignupStage::PasswordSet => "Please complete your profile first",
            SignupStage::ProfileCompleted => "Signup is already complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupContext {
    pub email: String,
    pub stage: SignupStage,
}

pub struct SignupFlow {
    api: Arc<dyn AuthApi>,
    context: SignupContext,
}

impl SignupFlow {
    /// Ask the server for a verification code for `email`.
    pub async fn start(api: Arc<dyn AuthApi>, email: &str) -> Result<Self, ClientError> {
        let email = email.trim().to_lowercase();
        validation::email(&email)?;
        api.request_verification(&email).await?;
        info!("Verification code requested for {}", email);
        Ok(Self {
            api,
            context: SignupContext {
                email,
                stage: SignupStage::AwaitingVerification,
            },
        })
    }

    pub fn resume(api: Arc<dyn AuthApi>, context: SignupContext) -> Self {
        Self { api, context }
    }

    pub fn context(&self) -> &SignupContext {
        &self.context
    }

    pub fn email(&self) -> &str {
        &self.context.email
    }

    pub fn stage(&self) -> SignupStage {
        self.context.stage
    }

    pub async fn resend_code(&self) -> Result<String, ClientError> {
        self.require(SignupStage::AwaitingVerification)?;
        let response = self.api.request_verification(&self.context.email).await?;
        Ok(response.message)
    }

    pub async fn verify(&mut self, code: &str) -> Result<String, ClientError> {
        self.require(SignupStage::AwaitingVerification)?;
        let code = code.trim();
        validation::verification_code(code)?;

        let response = self.api.verify_token(&self.context.email, code).await?;
        self.context.stage = SignupStage::EmailVerified;
        info!("Email {} verified", self.context.email);
        Ok(response.message)
    }

    pub async fn set_password(&mut self, password: &str, confirm: &str) -> Result<String, ClientError> {
        self.require(SignupStage::EmailVerified)?;
        validation::password_pair(password, confirm)?;

        let req = SetPasswordRequest {
            email: self.context.email.clone(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        };
        let response = self.api.set_password(&req).await?;
        self.context.stage = SignupStage::PasswordSet;
        Ok(response.message)
    }

    /// Submit the profile form. Its `email` is overwritten with the one
    /// being registered.
    pub async fn complete_profile(
        &mut self,
        mut form: CompleteProfileRequest,
    ) -> Result<String, ClientError> {
        self.require(SignupStage::PasswordSet)?;
        form.email = self.context.email.clone();
        form.name = form.name.trim().to_string();
        form.mobile_phone = form.mobile_phone.trim().to_string();
        validation::completion_form(&form)?;

        let response = self.api.complete_profile(&form).await?;
        self.context.stage = SignupStage::ProfileCompleted;
        info!("Signup completed for {}", self.context.email);
        Ok(response.message)
    }

    /// Where the user should be sent next.
    pub fn next_route(&self) -> Route {
        match self.context.stage {
            SignupStage::AwaitingVerification => Route::VerifyEmail,
            SignupStage::EmailVerified => Route::SetPassword,
            SignupStage::PasswordSet => Route::CompleteProfile,
            SignupStage::ProfileCompleted => Route::Login,
        }
    }

    fn require(&self, stage: SignupStage) -> Result<(), ClientError> {
        let current = self.context.stage;
        if current == stage {
            return Ok(());
        }
        let message = if current < stage {
            current.ahead_message()
        } else {
            "This step has already been completed"
        };
        Err(ClientError::SignupStep(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fakes::*;
    use scholar_types::api::MessageResponse;

    fn form() -> CompleteProfileRequest {
        CompleteProfileRequest {
            email: String::new(),
            name: " Asha Mwakyusa ".into(),
            sex: "Female".into(),
            mobile_phone: "0712345678".into(),
            university_name: "University of Dar es Salaam".into(),
            university_registration_id: "2022-04-01234".into(),
            program_name: "BSc Computer Engineering".into(),
            enrolled_year: "2022".into(),
            batch_number: 3,
        }
    }

    fn fake() -> Arc<FakeAuth> {
        let fake = FakeAuth {
            message: Script::always(MessageResponse::new("ok")),
            ..Default::default()
        };
        Arc::new(fake)
    }

    #[tokio::test]
    async fn test_full_flow() {
        let fake = fake();
        let mut flow = SignupFlow::start(fake.clone(), " New@Example.com ").await.unwrap();
        assert_eq!(flow.email(), "new@example.com");
        assert_eq!(flow.next_route(), Route::VerifyEmail);

        flow.verify("123456").await.unwrap();
        assert_eq!(flow.next_route(), Route::SetPassword);

        flow.set_password("Str0ng!pass", "Str0ng!pass").await.unwrap();
        assert_eq!(flow.next_route(), Route::CompleteProfile);

        flow.complete_profile(form()).await.unwrap();
        assert_eq!(flow.stage(), SignupStage::ProfileCompleted);
        assert_eq!(flow.next_route(), Route::Login);

        assert_eq!(
            fake.verified_with.lock().unwrap()[0],
            ("new@example.com".to_string(), "123456".to_string())
        );
        let completed = fake.completed.lock().unwrap();
        assert_eq!(completed[0].email, "new@example.com");
        assert_eq!(completed[0].name, "Asha Mwakyusa");
    }

    #[tokio::test]
    async fn test_start_rejects_bad_email() {
        let fake = fake();
        assert!(matches!(
            SignupFlow::start(fake.clone(), "nope").await,
            Err(ClientError::Validation(_))
        ));
        assert_eq!(fake.message.calls(), 0);
    }

    #[tokio::test]
    async fn test_steps_refuse_wrong_stage() {
        let fake = fake();
        let mut flow = SignupFlow::resume(
            fake.clone(),
            SignupContext {
                email: "new@example.com".into(),
                stage: SignupStage::AwaitingVerification,
            },
        );

        let err = flow
            .set_password("Str0ng!pass", "Str0ng!pass")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Please verify your email first");

        flow.verify("123456").await.unwrap();
        let err = flow.verify("123456").await.unwrap_err();
        assert_eq!(err.user_message(), "This step has already been completed");
        assert!(flow.resend_code().await.is_err());
        // two verification calls would have been two API calls
        assert_eq!(fake.message.calls(), 1);
    }

    #[tokio::test]
    async fn test_bad_code_and_weak_password_stay_local() {
        let fake = fake();
        let mut flow = SignupFlow::resume(
            fake.clone(),
            SignupContext {
                email: "new@example.com".into(),
                stage: SignupStage::AwaitingVerification,
            },
        );
        assert!(flow.verify("12ab").await.is_err());
        assert_eq!(flow.stage(), SignupStage::AwaitingVerification);

        let mut flow = SignupFlow::resume(
            fake.clone(),
            SignupContext {
                email: "new@example.com".into(),
                stage: SignupStage::EmailVerified,
            },
        );
        let err = flow.set_password("password", "password").await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "Password must contain at least one uppercase letter"
        );
        assert_eq!(fake.message.calls(), 0);
    }

    #[tokio::test]
    async fn test_server_rejection_keeps_stage() {
        let fake = Arc::new(FakeAuth::default());
        fake.message.push(Err(ClientError::Status {
            status: 400,
            message: "Invalid token".into(),
        }));
        let mut flow = SignupFlow::resume(
            fake,
            SignupContext {
                email: "new@example.com".into(),
                stage: SignupStage::AwaitingVerification,
            },
        );

        let err = flow.verify("654321").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid token");
        assert_eq!(flow.stage(), SignupStage::AwaitingVerification);
    }

    #[test]
    fn test_context_serializes() {
        let ctx = SignupContext {
            email: "new@example.com".into(),
            stage: SignupStage::PasswordSet,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["stage"], "passwordSet");
    }
}
