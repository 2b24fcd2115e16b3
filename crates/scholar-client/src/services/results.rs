use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use scholar_types::UploadedResult;

use crate::api::{HttpClient, path_segment};
use crate::error::ClientError;

/// A document picked for upload.
#[derive(Debug, Clone)]
pub struct ResultFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ResultFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk. The MIME type follows the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let mime_type = if is_pdf {
            "application/pdf"
        } else {
            "application/octet-stream"
        };
        Ok(Self::new(file_name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[async_trait]
pub trait ResultsApi: Send + Sync {
    async fn list(&self) -> Result<Vec<UploadedResult>, ClientError>;
    async fn upload(&self, file: &ResultFile) -> Result<UploadedResult, ClientError>;
    async fn delete(&self, file_name: &str) -> Result<(), ClientError>;
    async fn download(&self, file_name: &str) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl ResultsApi for HttpClient {
    async fn list(&self) -> Result<Vec<UploadedResult>, ClientError> {
        self.get_json("/resultpdf/list").await
    }

    async fn upload(&self, file: &ResultFile) -> Result<UploadedResult, ClientError> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("result", part);
        self.post_multipart("/resultpdf", form).await
    }

    async fn delete(&self, file_name: &str) -> Result<(), ClientError> {
        HttpClient::delete(self, &format!("/resultpdf/{}", path_segment(file_name))).await
    }

    async fn download(&self, file_name: &str) -> Result<Vec<u8>, ClientError> {
        self.get_bytes(&format!("/resultpdf/{}", path_segment(file_name)))
            .await
    }
}
