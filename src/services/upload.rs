use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// An uploaded image that already passed the MIME and size validation at the
/// API boundary. The extension is derived from the declared MIME type, never
/// from the client filename.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// File store for one uploads directory (post images or avatars).
///
/// Filenames are generated server-side; nothing derived from the client
/// filename ever reaches the filesystem.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a stored filename to its on-disk path. The input is reduced
    /// to its final path component so traversal sequences cannot escape the
    /// uploads directory.
    #[must_use]
    pub fn path_of(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .unwrap_or_else(|| OsStr::new(filename));
        self.root.join(name)
    }

    /// Writes the bytes under a generated `{prefix}_{uuid}.{extension}` name
    /// and returns the filename.
    pub async fn save(&self, prefix: &str, extension: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create uploads dir {}", self.root.display()))?;

        let filename = format!("{prefix}_{}.{extension}", Uuid::new_v4().simple());
        let path = self.root.join(&filename);

        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload to {}", path.display()))?;

        Ok(filename)
    }

    /// Removes a stored file. A missing file is fine; any other failure is
    /// logged and swallowed so record deletion is never blocked by it.
    pub async fn remove(&self, filename: &str) {
        let path = self.path_of(filename);
        if let Err(err) = fs::remove_file(&path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), "Failed to remove upload: {err}");
        }
    }

    pub async fn exists(&self, filename: &str) -> bool {
        fs::try_exists(self.path_of(filename)).await.unwrap_or(false)
    }
}
