//! Filesystem storage backend.
//!
//! Files live under a media root using their storage name as relative path.
//! Content is written to a temp file first and then hard-linked under its
//! final name, which never replaces an existing file. Parent directories are
//! created on demand.

use async_trait::async_trait;
use multifile_core::storage::{join_url, numbered_name};
use multifile_core::{Error, FileStream, Result, StorageBackend};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stores files below `root` and serves them under `base_url`.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `name`. Names escaping the root are rejected.
    fn full_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(Error::InvalidInput(format!(
                "Detected path traversal attempt in '{}'",
                name
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Check that the root can be written, read and cleaned up.
    ///
    /// Run at startup to catch permission problems before the first save.
    pub async fn validate(&self) -> Result<()> {
        let probe_dir = self.root.join(".health-check");
        let probe = probe_dir.join("probe.bin");
        let data = b"multifile-health-check";

        fs::create_dir_all(&probe_dir).await?;
        fs::write(&probe, data).await?;
        if fs::read(&probe).await? != data {
            return Err(Error::Storage("read-back mismatch".to_string()));
        }
        fs::remove_file(&probe).await?;
        let _ = fs::remove_dir(&probe_dir).await;
        Ok(())
    }

    /// Write `content` to a hidden temp file in `dir`.
    async fn write_temp(&self, dir: &Path, content: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(dir).await.map_err(|e| {
            warn!(parent = %dir.display(), error = %e, "filesystem_storage: create_dir_all failed");
            e
        })?;

        let temp_path = dir.join(format!(".upload.{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "filesystem_storage: File::create failed");
            e
        })?;
        let written = async {
            file.write_all(content).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(temp_path)
    }

    /// Link `temp_path` under the first free numbered variant of `name`.
    ///
    /// `hard_link` fails with `AlreadyExists` instead of replacing, so two
    /// concurrent saves of the same name never end up on one file.
    async fn claim_name(
        &self,
        temp_path: &Path,
        name: &str,
        max_length: Option<usize>,
    ) -> Result<(String, PathBuf)> {
        let mut attempt = 0usize;
        loop {
            let candidate = numbered_name(name, attempt, max_length)?;
            let full_path = self.full_path(&candidate)?;
            match fs::hard_link(temp_path, &full_path).await {
                Ok(()) => return Ok((candidate, full_path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(file_name = %candidate, "filesystem_storage: name taken");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        from = %temp_path.display(),
                        to = %full_path.display(),
                        error = %e,
                        "filesystem_storage: hard_link failed"
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

fn not_found(name: &str, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(format!("file {}", name))
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn open(&self, name: &str) -> Result<FileStream> {
        let full_path = self.full_path(name)?;
        let data = fs::read(&full_path).await.map_err(|e| not_found(name, e))?;
        Ok(FileStream::new(data))
    }

    async fn save(&self, name: &str, content: &[u8], max_length: Option<usize>) -> Result<String> {
        let target = self.full_path(name)?;
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();
        let temp_path = self.write_temp(&dir, content).await?;

        let claimed = self.claim_name(&temp_path, name, max_length).await;
        let _ = fs::remove_file(&temp_path).await;
        let (name, full_path) = claimed?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }
        debug!(
            file_name = %name,
            full_path = %full_path.display(),
            size_bytes = content.len(),
            "filesystem_storage: save"
        );
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let full_path = self.full_path(name)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let full_path = self.full_path(name)?;
        Ok(fs::try_exists(full_path).await?)
    }

    async fn size(&self, name: &str) -> Result<u64> {
        let full_path = self.full_path(name)?;
        let metadata = fs::metadata(&full_path).await.map_err(|e| not_found(name, e))?;
        Ok(metadata.len())
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        self.full_path(name)
    }

    fn url(&self, name: &str) -> Result<String> {
        Ok(join_url(&self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_rejects_traversal() {
        let storage = FilesystemStorage::new("/srv/media", "/media/");
        assert_eq!(
            storage.path("docs/a.txt").unwrap(),
            PathBuf::from("/srv/media/docs/a.txt")
        );
        assert!(storage.path("../etc/passwd").is_err());
        assert!(storage.path("docs/../../x").is_err());
        assert!(storage.path("/etc/passwd").is_err());
        assert!(storage.path("").is_err());
    }

    #[test]
    fn test_url() {
        let storage = FilesystemStorage::new("/srv/media", "https://cdn.example.com/media");
        assert_eq!(
            storage.url("docs/a b.txt").unwrap(),
            "https://cdn.example.com/media/docs/a%20b.txt"
        );
    }
}
