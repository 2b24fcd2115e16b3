use async_trait::async_trait;

use scholar_types::NotificationPreferences;
use scholar_types::api::{ChangePasswordRequest, MessageResponse};

use crate::api::HttpClient;
use crate::error::ClientError;

#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn preferences(&self) -> Result<NotificationPreferences, ClientError>;
    /// 409 when `prefs.version` is stale.
    async fn update_notifications(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<NotificationPreferences, ClientError>;
    async fn change_password(
        &self,
        req: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ClientError>;
}

#[async_trait]
impl SettingsApi for HttpClient {
    async fn preferences(&self) -> Result<NotificationPreferences, ClientError> {
        self.get_json("/settings/preferences").await
    }

    async fn update_notifications(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<NotificationPreferences, ClientError> {
        self.post_json("/settings/update-notifications", prefs).await
    }

    async fn change_password(
        &self,
        req: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.post_json("/settings/security", req).await
    }
}
