use std::sync::Arc;

use tracing::{info, warn};

use scholar_types::NotificationPreferences;
use scholar_types::api::ChangePasswordRequest;

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::services::SettingsApi;
use crate::validation;

/// The switches a user flipped. Unset fields keep whatever the server has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferenceChange {
    pub receive_announcements: Option<bool>,
    pub receive_payment_updates: Option<bool>,
    pub receive_result_updates: Option<bool>,
}

impl PreferenceChange {
    pub fn apply(&self, prefs: &mut NotificationPreferences) {
        if let Some(v) = self.receive_announcements {
            prefs.receive_announcements = v;
        }
        if let Some(v) = self.receive_payment_updates {
            prefs.receive_payment_updates = v;
        }
        if let Some(v) = self.receive_result_updates {
            prefs.receive_result_updates = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct SettingsHolder {
    api: Arc<dyn SettingsApi>,
    cell: ResourceCell<NotificationPreferences>,
}

impl SettingsHolder {
    pub fn new(api: Arc<dyn SettingsApi>) -> Self {
        Self {
            api,
            cell: ResourceCell::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<NotificationPreferences> {
        self.cell.snapshot()
    }

    pub async fn refresh(&self) -> Result<NotificationPreferences, ClientError> {
        self.cell.begin();
        match self.api.preferences().await {
            Ok(prefs) => {
                self.cell.fill(prefs.clone());
                Ok(prefs)
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    /// Optimistically apply `change` and send it. A version conflict
    /// re-fetches, re-applies the change and retries once; any other outcome
    /// that is not a success reverts to the server's state.
    pub async fn update(
        &self,
        change: PreferenceChange,
    ) -> Result<NotificationPreferences, ClientError> {
        let previous = self.cell.read(|s| s.value.clone());
        let mut optimistic = previous.clone();
        change.apply(&mut optimistic);
        self.cell.update(|s| {
            s.value = optimistic.clone();
            s.is_loading = true;
            s.error = None;
        });

        let first = self.api.update_notifications(&optimistic).await;
        let outcome = match first {
            Err(e) if e.is_conflict() => {
                info!("Preferences changed elsewhere, retrying on the latest copy");
                self.retry(change).await
            }
            other => other,
        };

        match outcome {
            Ok(saved) => {
                self.cell.fill(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!("Preference update failed, reverting: {}", e);
                self.revert(previous).await;
                Err(self.cell.fail(e))
            }
        }
    }

    async fn retry(
        &self,
        change: PreferenceChange,
    ) -> Result<NotificationPreferences, ClientError> {
        let mut latest = self.api.preferences().await?;
        change.apply(&mut latest);
        self.cell.update(|s| s.value = latest.clone());
        self.api.update_notifications(&latest).await
    }

    async fn revert(&self, previous: NotificationPreferences) {
        let restored = match self.api.preferences().await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Could not re-fetch preferences: {}", e);
                previous
            }
        };
        self.cell.update(|s| s.value = restored);
    }

    /// Validate locally, then ask the server to swap the password.
    pub async fn change_password(
        &self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<String, ClientError> {
        let checked = validation::required("Current password", current)
            .and_then(|_| validation::password_pair(new, confirm));
        if let Err(e) = checked {
            return Err(self.cell.fail(e.into()));
        }

        let req = ChangePasswordRequest {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        self.cell.begin();
        match self.api.change_password(&req).await {
            Ok(response) => {
                self.cell.update(|s| s.is_loading = false);
                Ok(response.message)
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    pub fn clear(&self) {
        self.cell.reset();
    }
}
