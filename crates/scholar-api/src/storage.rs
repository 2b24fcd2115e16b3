use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// On-disk storage for uploaded files.
///
/// Each file lives at `{storage_dir}/{owner}/{file_name}`, where the owner is
/// a user id for results and a fixed category for shared documents. The
/// metadata row in the database is the source of truth for what exists.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("File storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn file_path(&self, owner: &str, file_name: &str) -> PathBuf {
        self.dir.join(owner).join(file_name)
    }

    /// Write (or overwrite) a document.
    pub async fn write_file(&self, owner: &str, file_name: &str, data: &[u8]) -> Result<()> {
        fs::create_dir_all(self.dir.join(owner)).await?;
        fs::write(self.file_path(owner, file_name), data).await?;
        Ok(())
    }

    pub async fn read_file(&self, owner: &str, file_name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(owner, file_name)).await?)
    }

    /// Delete a document. A file that is already gone is not an error.
    pub async fn delete_file(&self, owner: &str, file_name: &str) -> Result<()> {
        let path = self.file_path(owner, file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file already gone: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
