use async_trait::async_trait;

use scholar_types::CareerDocument;

use crate::api::HttpClient;
use crate::error::ClientError;

/// Shared mentorship documents published by the scholarship office.
#[async_trait]
pub trait DocumentsApi: Send + Sync {
    async fn resume_templates(&self) -> Result<Vec<CareerDocument>, ClientError>;
    async fn download_document(&self, id: i64) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl DocumentsApi for HttpClient {
    async fn resume_templates(&self) -> Result<Vec<CareerDocument>, ClientError> {
        self.get_json("/documents/resume-templates").await
    }

    async fn download_document(&self, id: i64) -> Result<Vec<u8>, ClientError> {
        self.get_bytes(&format!("/documents/download/{}", id)).await
    }
}
