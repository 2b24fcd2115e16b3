use std::sync::Arc;

use tracing::info;

use scholar_types::UploadedResult;

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::loader::LoadGate;
use crate::services::{ResultFile, ResultsApi};
use crate::validation;

pub struct ResultsHolder {
    api: Arc<dyn ResultsApi>,
    gate: LoadGate,
    cell: ResourceCell<Vec<UploadedResult>>,
}

impl ResultsHolder {
    pub fn new(api: Arc<dyn ResultsApi>, gate: LoadGate) -> Self {
        Self {
            api,
            gate,
            cell: ResourceCell::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<Vec<UploadedResult>> {
        self.cell.snapshot()
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.cell.begin();
        match self.api.list().await {
            Ok(list) => {
                self.cell.fill(list);
                Ok(())
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    /// Upload a PDF. The returned record goes to the front of the list,
    /// replacing any earlier upload with the same file name.
    pub async fn upload(&self, file: &ResultFile) -> Result<UploadedResult, ClientError> {
        if let Err(e) = validation::result_file(&file.file_name, &file.mime_type, file.size()) {
            return Err(self.cell.fail(e.into()));
        }

        self.cell.begin();
        match self.api.upload(file).await {
            Ok(uploaded) => {
                info!("Uploaded {} ({} bytes)", uploaded.file_name, uploaded.file_size);
                self.cell.update(|s| {
                    s.value.retain(|r| r.file_name != uploaded.file_name);
                    s.value.insert(0, uploaded.clone());
                    s.is_loading = false;
                });
                Ok(uploaded)
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    pub async fn delete(&self, file_name: &str) -> Result<(), ClientError> {
        self.cell.begin();
        match self.api.delete(file_name).await {
            Ok(()) => {
                self.cell.update(|s| {
                    s.value.retain(|r| r.file_name != file_name);
                    s.is_loading = false;
                });
                Ok(())
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    pub async fn download(&self, file_name: &str) -> Result<Vec<u8>, ClientError> {
        self.api.download(file_name).await.map_err(|e| self.cell.fail(e))
    }

    pub async fn ensure_loaded(&self) {
        if self.gate.is_loading() {
            return;
        }
        if !self.cell.is_populated() {
            let _ = self.refresh().await;
        }
    }

    pub(crate) fn apply(&self, list: Vec<UploadedResult>) {
        self.cell.fill(list);
    }

    pub fn clear(&self) {
        self.cell.reset();
    }
}
