use async_trait::async_trait;

use scholar_types::{Profile, ProfileUpdate};

use crate::api::HttpClient;
use crate::error::ClientError;

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn fetch_profile(&self) -> Result<Profile, ClientError>;
    /// Returns the whole profile as stored after the update.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ClientError>;
}

#[async_trait]
impl ProfileApi for HttpClient {
    async fn fetch_profile(&self) -> Result<Profile, ClientError> {
        self.get_json("/profile").await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        self.put_json("/profile/info", update).await
    }
}
