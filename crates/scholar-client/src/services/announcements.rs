use async_trait::async_trait;
use uuid::Uuid;

use scholar_types::AnnouncementPage;
use scholar_types::api::AnnouncementQuery;

use crate::api::HttpClient;
use crate::error::ClientError;

#[async_trait]
pub trait AnnouncementsApi: Send + Sync {
    async fn list(&self, page: u32, size: u32) -> Result<AnnouncementPage, ClientError>;
    async fn mark_read(&self, id: Uuid) -> Result<(), ClientError>;
}

#[async_trait]
impl AnnouncementsApi for HttpClient {
    async fn list(&self, page: u32, size: u32) -> Result<AnnouncementPage, ClientError> {
        let query = AnnouncementQuery { page, size };
        self.get_json_with_query("/announcements/user", &query).await
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), ClientError> {
        self.patch(&format!("/announcements/{}/read", id)).await
    }
}
