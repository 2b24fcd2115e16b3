use std::sync::Arc;

use tracing::debug;

use scholar_types::{Profile, ProfileUpdate};

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::loader::LoadGate;
use crate::services::ProfileApi;
use crate::validation::{self, ValidationError};

pub struct ProfileHolder {
    api: Arc<dyn ProfileApi>,
    gate: LoadGate,
    cell: ResourceCell<Option<Profile>>,
}

impl ProfileHolder {
    pub fn new(api: Arc<dyn ProfileApi>, gate: LoadGate) -> Self {
        Self {
            api,
            gate,
            cell: ResourceCell::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<Option<Profile>> {
        self.cell.snapshot()
    }

    pub async fn refresh(&self) -> Result<Profile, ClientError> {
        self.cell.begin();
        match self.api.fetch_profile().await {
            Ok(profile) => {
                self.cell.fill(Some(profile.clone()));
                Ok(profile)
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    /// Send a partial edit. The stored profile is replaced wholesale by what
    /// the server returns.
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        if let Err(e) = check_update(update) {
            return Err(self.cell.fail(e.into()));
        }

        self.cell.begin();
        match self.api.update_profile(update).await {
            Ok(profile) => {
                self.cell.fill(Some(profile.clone()));
                Ok(profile)
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    pub async fn ensure_loaded(&self) {
        if self.gate.is_loading() {
            debug!("Profile fetch deferred to the running prefetch");
            return;
        }
        if !self.cell.is_populated() {
            let _ = self.refresh().await;
        }
    }

    pub(crate) fn apply(&self, profile: Profile) {
        self.cell.fill(Some(profile));
    }

    pub fn clear(&self) {
        self.cell.reset();
    }
}

fn check_update(update: &ProfileUpdate) -> Result<(), ValidationError> {
    if let Some(name) = &update.name {
        validation::required("Name", name)?;
    }
    if let Some(phone) = &update.mobile_phone {
        validation::phone(phone.trim())?;
    }
    if update.batch_number == Some(0) {
        return Err(ValidationError::BatchNumber);
    }
    Ok(())
}
