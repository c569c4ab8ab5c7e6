use anyhow::{Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use hoaxify_lifecycle::BlobStore;

/// Flat on-disk file storage, one instance per upload folder (attachments,
/// profile images).
///
/// Each file lives at `{dir}/{filename}`. Filenames are generated
/// server-side, never taken from the client.
pub struct DiskStorage {
    dir: PathBuf,
}

impl DiskStorage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a stored file. Rejects anything that is not a bare filename.
    pub fn file_path(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.starts_with('.')
        {
            bail!("Invalid stored filename: {:?}", filename);
        }
        Ok(self.dir.join(filename))
    }

    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(filename)?;
        fs::write(&path, data).await?;
        Ok(())
    }

    pub async fn exists(&self, filename: &str) -> bool {
        match self.file_path(filename) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl BlobStore for DiskStorage {
    async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.file_path(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted stored file {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", filename);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
