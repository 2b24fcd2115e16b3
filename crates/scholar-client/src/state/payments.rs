use std::sync::Arc;

use tracing::{debug, info, warn};

use scholar_types::{Payment, PaymentKind};

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::loader::LoadGate;
use crate::services::PaymentsApi;
use crate::storage::{LocalStore, PAYMENT_CACHE_KEY};
use crate::validation;

pub const CACHED_PAYMENTS_MESSAGE: &str = "Network error. Showing cached payment data.";
pub const PAYMENTS_FAILED_MESSAGE: &str =
    "Failed to load your payment information. Please try again later.";

/// Payment history, newest first, with an offline fallback kept in the local
/// store.
pub struct PaymentsHolder {
    api: Arc<dyn PaymentsApi>,
    store: LocalStore,
    gate: LoadGate,
    cell: ResourceCell<Vec<Payment>>,
}

impl PaymentsHolder {
    pub fn new(api: Arc<dyn PaymentsApi>, store: LocalStore, gate: LoadGate) -> Self {
        Self {
            api,
            store,
            gate,
            cell: ResourceCell::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<Vec<Payment>> {
        self.cell.snapshot()
    }

    /// Fetch the history. Skipped while a prefetch is running, since that
    /// will deliver the list.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        if self.gate.is_loading() {
            debug!("Payment refresh skipped, prefetch in flight");
            return Ok(());
        }

        self.cell.begin();
        match self.api.history().await {
            Ok(list) => {
                self.apply(list);
                Ok(())
            }
            Err(e) => {
                let cached = self
                    .store
                    .get::<Vec<Payment>>(PAYMENT_CACHE_KEY)
                    .filter(|c| !c.is_empty());
                warn!("Payment history fetch failed: {}", e);
                match cached {
                    Some(list) => self.cell.update(|s| {
                        s.value = list;
                        s.is_loading = false;
                        s.error = Some(CACHED_PAYMENTS_MESSAGE.to_string());
                    }),
                    None => self.cell.update(|s| {
                        s.is_loading = false;
                        s.error = Some(PAYMENTS_FAILED_MESSAGE.to_string());
                    }),
                }
                Err(e)
            }
        }
    }

    /// Submit a control number. Nothing goes out unless it is exactly 12
    /// digits; on success the history is re-fetched.
    pub async fn submit(&self, kind: PaymentKind, control_number: &str) -> Result<String, ClientError> {
        if let Err(e) = validation::control_number(control_number) {
            return Err(self.cell.fail(e.into()));
        }

        self.cell.begin();
        let response = match self.api.submit(kind, control_number).await {
            Ok(r) => r,
            Err(e) => return Err(self.cell.fail(e)),
        };
        info!("{} control number submitted", kind.label());

        match self.api.history().await {
            Ok(list) => self.apply(list),
            Err(e) => {
                // the submission went through; only the listing is stale
                warn!("Payment history refresh after submit failed: {}", e);
                self.cell.fail(e);
            }
        }
        Ok(response.message)
    }

    pub async fn ensure_loaded(&self) {
        if self.gate.is_loading() {
            return;
        }
        if !self.cell.is_populated() {
            let _ = self.refresh().await;
        }
    }

    pub(crate) fn apply(&self, list: Vec<Payment>) {
        if !list.is_empty() {
            if let Err(e) = self.store.set(PAYMENT_CACHE_KEY, &list) {
                warn!("Could not cache payment history: {}", e);
            }
        }
        self.cell.fill(list);
    }

    /// Drop the in-memory list and the offline cache.
    pub fn clear(&self) {
        self.cell.reset();
        if let Err(e) = self.store.remove(PAYMENT_CACHE_KEY) {
            warn!("Could not drop payment cache: {}", e);
        }
    }
}
