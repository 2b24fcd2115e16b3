//! Typed wrappers around the REST endpoints, one trait per resource so the
//! state holders can be driven by fakes in tests.

pub mod announcements;
pub mod auth;
pub mod documents;
pub mod payments;
pub mod profile;
pub mod results;
pub mod settings;

use std::sync::Arc;

pub use announcements::AnnouncementsApi;
pub use auth::AuthApi;
pub use documents::DocumentsApi;
pub use payments::PaymentsApi;
pub use profile::ProfileApi;
pub use results::{ResultFile, ResultsApi};
pub use settings::SettingsApi;

use crate::api::HttpClient;

#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthApi>,
    pub profile: Arc<dyn ProfileApi>,
    pub payments: Arc<dyn PaymentsApi>,
    pub results: Arc<dyn ResultsApi>,
    pub announcements: Arc<dyn AnnouncementsApi>,
    pub settings: Arc<dyn SettingsApi>,
    pub documents: Arc<dyn DocumentsApi>,
}

impl Services {
    pub fn http(client: HttpClient) -> Self {
        let client = Arc::new(client);
        Self {
            auth: client.clone(),
            profile: client.clone(),
            payments: client.clone(),
            results: client.clone(),
            announcements: client.clone(),
            settings: client.clone(),
            documents: client,
        }
    }
}
