//! A single file reference inside a file list.
//!
//! A [`FileHandle`] is either committed (its bytes live in the storage
//! backend under `name`) or pending (it carries an [`Upload`] that has not
//! been stored yet). Handles never save their owning record; staging and
//! committing are driven by [`crate::commit::CommitCoordinator`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::RecordKey;
use crate::storage::{FileStream, StorageBackend};
use crate::upload::Upload;

fn restored_committed() -> bool {
    true
}

/// One file of a file-list field.
///
/// Serializes to its name only; a deserialized handle is committed but
/// unlinked until the accessor relinks it to a field and backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct FileHandle {
    name: Option<String>,
    #[serde(skip)]
    field: String,
    #[serde(skip)]
    record: Option<RecordKey>,
    #[serde(skip)]
    storage: Option<Arc<dyn StorageBackend>>,
    #[serde(skip, default = "restored_committed")]
    committed: bool,
    #[serde(skip)]
    cached_size: Option<u64>,
    #[serde(skip)]
    pending: Option<Upload>,
    #[serde(skip)]
    deleted: bool,
    #[serde(skip)]
    stream: Option<FileStream>,
}

impl FileHandle {
    /// A handle for a name already present in `storage`.
    pub fn stored(
        name: impl Into<String>,
        field: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        record: Option<RecordKey>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            field: field.into(),
            record,
            storage: Some(storage),
            committed: true,
            cached_size: None,
            pending: None,
            deleted: false,
            stream: None,
        }
    }

    /// A handle for an upload that still has to be committed.
    pub fn pending(
        upload: Upload,
        field: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        record: Option<RecordKey>,
    ) -> Self {
        Self {
            name: Some(upload.name.clone()),
            field: field.into(),
            record,
            storage: Some(storage),
            committed: false,
            cached_size: None,
            pending: Some(upload),
            deleted: false,
            stream: None,
        }
    }

    /// A handle with no file associated.
    pub fn unbound(
        field: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        record: Option<RecordKey>,
    ) -> Self {
        Self {
            name: None,
            field: field.into(),
            record,
            storage: Some(storage),
            committed: false,
            cached_size: None,
            pending: None,
            deleted: false,
            stream: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when a non-empty name is bound.
    pub fn is_bound(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// True when the handle carries upload content not yet stored.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// True after [`FileHandle::delete`] removed the backing object.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn record(&self) -> Option<&RecordKey> {
        self.record.as_ref()
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.pending.as_ref()
    }

    /// Size observed when the handle was committed.
    pub fn cached_size(&self) -> Option<u64> {
        self.cached_size
    }

    pub fn is_linked(&self) -> bool {
        self.storage.is_some()
    }

    /// Attach field, backend and record to a handle that lost them.
    pub fn link(
        &mut self,
        field: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
        record: Option<RecordKey>,
    ) {
        self.field = field.into();
        self.storage = Some(storage);
        self.record = record;
    }

    fn require_file(&self) -> Result<&str> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::Unbound {
                field: self.field.clone(),
            }),
        }
    }

    fn storage(&self) -> Result<&Arc<dyn StorageBackend>> {
        self.storage.as_ref().ok_or_else(|| {
            Error::Unlinked(self.name.clone().unwrap_or_else(|| self.field.clone()))
        })
    }

    /// Open the file, fetching it from the backend on first use.
    ///
    /// Opening an already open handle rewinds its stream.
    pub async fn open(&mut self) -> Result<&mut FileStream> {
        let name = self.require_file()?.to_string();
        if self.stream.is_none() {
            let stream = match &self.pending {
                Some(upload) => FileStream::new(upload.content.clone()),
                None => {
                    debug!(field = %self.field, file_name = %name, op = "open", "Opening stored file");
                    self.storage()?.open(&name).await?
                }
            };
            self.stream = Some(stream);
        }
        let stream = self.stream.get_or_insert_with(FileStream::default);
        stream.rewind();
        Ok(stream)
    }

    /// Close the open stream, if any.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.as_ref().map_or(true, FileStream::is_closed)
    }

    /// Size in bytes: the pending upload's size, or the backend's size for
    /// committed files.
    pub async fn size(&self) -> Result<u64> {
        let name = self.require_file()?;
        if !self.committed {
            if let Some(upload) = &self.pending {
                return Ok(upload.size());
            }
            if let Some(stream) = &self.stream {
                return Ok(stream.len());
            }
        }
        self.storage()?.size(name).await
    }

    pub fn path(&self) -> Result<PathBuf> {
        let name = self.require_file()?;
        self.storage()?.path(name)
    }

    pub fn url(&self) -> Result<String> {
        let name = self.require_file()?;
        self.storage()?.url(name)
    }

    /// Store `content` under a backend-chosen name derived from `name`.
    ///
    /// On success the handle is committed under the returned name, and the
    /// pending upload is released.
    pub async fn commit(
        &mut self,
        name: &str,
        content: &[u8],
        max_length: Option<usize>,
    ) -> Result<()> {
        let stored = self.storage()?.save(name, content, max_length).await?;
        debug!(
            field = %self.field,
            file_name = %stored,
            size_bytes = content.len(),
            op = "commit",
            "File committed"
        );
        self.name = Some(stored);
        self.committed = true;
        self.cached_size = Some(content.len() as u64);
        self.pending = None;
        self.deleted = false;
        self.stream = None;
        Ok(())
    }

    /// Commit the pending upload under `name`.
    pub async fn commit_pending(&mut self, name: &str, max_length: Option<usize>) -> Result<()> {
        let upload = self.pending.take().ok_or_else(|| {
            Error::InvalidInput(format!(
                "file '{}' of '{}' has no pending content",
                self.name.as_deref().unwrap_or(""),
                self.field
            ))
        })?;
        match self.commit(name, &upload.content, max_length).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pending = Some(upload);
                Err(e)
            }
        }
    }

    /// Delete the backing object and unbind the handle.
    ///
    /// No-op when unbound. The owning record is not saved; the caller saves
    /// it so the stored string drops the name.
    pub async fn delete(&mut self) -> Result<()> {
        let Some(name) = self.name.clone().filter(|n| !n.is_empty()) else {
            return Ok(());
        };
        if self.stream.is_some() {
            self.close();
            self.stream = None;
        }
        if self.committed {
            self.storage()?.delete(&name).await?;
        }
        debug!(field = %self.field, file_name = %name, op = "delete", "File deleted");

        self.name = None;
        self.cached_size = None;
        self.committed = false;
        self.pending = None;
        self.deleted = true;
        Ok(())
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("record", &self.record)
            .field("committed", &self.committed)
            .field("pending", &self.pending.as_ref().map(|u| u.size()))
            .field("linked", &self.storage.is_some())
            .finish()
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or(""))
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FileHandle {}

impl PartialEq<str> for FileHandle {
    fn eq(&self, other: &str) -> bool {
        self.name.as_deref() == Some(other)
    }
}

impl PartialEq<&str> for FileHandle {
    fn eq(&self, other: &&str) -> bool {
        self.name.as_deref() == Some(*other)
    }
}

impl PartialEq<String> for FileHandle {
    fn eq(&self, other: &String) -> bool {
        self.name.as_deref() == Some(other.as_str())
    }
}

impl Hash for FileHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn storage() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new("/media/"))
    }

    #[tokio::test]
    async fn test_unbound_operations_fail() {
        let mut handle = FileHandle::unbound("files", storage(), None);
        assert!(!handle.is_bound());
        assert!(handle.size().await.unwrap_err().is_unbound());
        assert!(handle.path().unwrap_err().is_unbound());
        assert!(handle.url().unwrap_err().is_unbound());
        assert!(handle.open().await.unwrap_err().is_unbound());
    }

    #[tokio::test]
    async fn test_empty_name_counts_as_unbound() {
        let handle = FileHandle::stored("", "files", storage(), None);
        assert!(handle.url().unwrap_err().is_unbound());
    }

    #[tokio::test]
    async fn test_stored_handle_delegates_to_backend() {
        let backend = storage();
        backend.insert("docs/a.txt", b"hello".to_vec()).await;
        let mut handle = FileHandle::stored("docs/a.txt", "files", backend.clone(), None);

        assert!(handle.is_committed());
        assert_eq!(handle.size().await.unwrap(), 5);
        assert_eq!(handle.url().unwrap(), "/media/docs/a.txt");
        assert!(handle.is_closed());

        let stream = handle.open().await.unwrap();
        assert_eq!(stream.read_all().unwrap(), b"hello");
        assert!(!handle.is_closed());

        // Reopen rewinds without another backend read.
        let stream = handle.open().await.unwrap();
        assert_eq!(stream.position(), 0);
        assert_eq!(backend.open_count(), 1);

        handle.close();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_pending_handle_size_uses_upload() {
        let handle = FileHandle::pending(
            Upload::new("new.txt", b"abcd".to_vec()),
            "files",
            storage(),
            None,
        );
        assert!(!handle.is_committed());
        assert!(handle.is_pending());
        assert_eq!(handle.size().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_commit_sets_name_and_committed() {
        let backend = storage();
        let mut handle = FileHandle::pending(
            Upload::new("new.txt", b"abcd".to_vec()),
            "files",
            backend.clone(),
            None,
        );
        handle.commit_pending("uploads/new.txt", Some(100)).await.unwrap();

        assert!(handle.is_committed());
        assert!(!handle.is_pending());
        assert_eq!(handle.name(), Some("uploads/new.txt"));
        assert_eq!(handle.cached_size(), Some(4));
        assert!(backend.exists("uploads/new.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_avoids_collisions() {
        let backend = storage();
        backend.insert("uploads/new.txt", b"old".to_vec()).await;
        let mut handle = FileHandle::pending(
            Upload::new("new.txt", b"abcd".to_vec()),
            "files",
            backend.clone(),
            None,
        );
        handle.commit_pending("uploads/new.txt", None).await.unwrap();
        assert_eq!(handle.name(), Some("uploads/new_1.txt"));
    }

    #[tokio::test]
    async fn test_commit_pending_without_content_fails() {
        let mut handle = FileHandle::stored("a.txt", "files", storage(), None);
        let err = handle.commit_pending("a.txt", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_unbinds() {
        let backend = storage();
        backend.insert("a.txt", b"x".to_vec()).await;
        let mut handle = FileHandle::stored("a.txt", "files", backend.clone(), None);
        handle.open().await.unwrap();

        handle.delete().await.unwrap();

        assert!(!handle.is_committed());
        assert!(handle.name().is_none());
        assert!(handle.is_deleted());
        assert!(handle.cached_size().is_none());
        assert!(!backend.exists("a.txt").await.unwrap());

        // Second delete is a no-op.
        handle.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_pending_does_not_touch_backend() {
        let backend = storage();
        backend.insert("new.txt", b"keep".to_vec()).await;
        let mut handle = FileHandle::pending(
            Upload::new("new.txt", b"abcd".to_vec()),
            "files",
            backend.clone(),
            None,
        );
        handle.delete().await.unwrap();
        assert!(handle.is_deleted());
        assert!(backend.exists("new.txt").await.unwrap());
    }

    #[test]
    fn test_equality_by_name() {
        let a = FileHandle::stored("a.txt", "files", storage(), None);
        let b = FileHandle::stored("a.txt", "other", storage(), None);
        let c = FileHandle::stored("c.txt", "files", storage(), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a == "a.txt");
        assert!(a == "a.txt".to_string());
        assert_eq!(a.to_string(), "a.txt");
    }

    #[test]
    fn test_serde_keeps_only_name() {
        let handle = FileHandle::stored("a.txt", "files", storage(), None);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"name":"a.txt"}"#);

        let restored: FileHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, handle);
        assert!(restored.is_committed());
        assert!(!restored.is_linked());
        assert!(matches!(restored.url(), Err(Error::Unlinked(_))));
    }
}
