//! A model: a named set of file-list fields persisted through a
//! [`RecordStore`].

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::commit::{CommitCoordinator, CommitOutcome};
use crate::error::{Error, Result};
use crate::field::FileListField;
use crate::handle::FileHandle;
use crate::record::{Record, RecordKey, RecordStore};
use crate::value::FieldValue;

/// What a save wrote, per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub key: RecordKey,
    pub fields: BTreeMap<String, CommitOutcome>,
}

impl SaveReport {
    /// Stored string written for `field`.
    pub fn stored(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|o| o.stored.as_str())
    }

    /// Total number of files committed by the save.
    pub fn committed_count(&self) -> usize {
        self.fields.values().map(|o| o.committed.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct FileModel {
    name: String,
    fields: Vec<FileListField>,
}

impl FileModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FileListField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FileListField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Result<&FileListField> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::NotFound(format!("field {} on {}", name, self.name)))
    }

    pub fn key(&self, id: Uuid) -> RecordKey {
        RecordKey::new(self.name.clone(), id)
    }

    /// A record with every field empty.
    pub fn new_record(&self, id: Uuid) -> Record {
        let mut record = Record::new(self.key(id));
        for field in &self.fields {
            record.set(field.name(), FieldValue::Empty);
        }
        record
    }

    /// Load a record; each field holds its raw column value until read.
    pub async fn load(&self, store: &dyn RecordStore, id: Uuid) -> Result<Option<Record>> {
        let key = self.key(id);
        let columns: Vec<&str> = self.fields.iter().map(FileListField::name).collect();
        let Some(row) = store.fetch_columns(&key, &columns).await? else {
            debug!(model = %self.name, record_id = %id, op = "load", "Record not found");
            return Ok(None);
        };
        let mut record = Record::new(key);
        for field in &self.fields {
            let raw = row.get(field.name()).cloned().flatten();
            record.set(field.name(), FieldValue::from(raw));
        }
        Ok(Some(record))
    }

    /// Handles of `field` on `record`, decoding on first access.
    pub fn files<'r>(&self, record: &'r mut Record, field: &str) -> Result<&'r mut Vec<FileHandle>> {
        let field = self.field(field)?;
        let (key, value) = record.split_mut(field.name());
        Ok(field.accessor().read(Some(key), value))
    }

    /// Commit pending files of every field, then write all stored strings
    /// in one call. Nothing is written if any field fails to commit.
    pub async fn save(&self, store: &dyn RecordStore, record: &mut Record) -> Result<SaveReport> {
        let start = Instant::now();
        let mut report = SaveReport {
            key: record.key().clone(),
            fields: BTreeMap::new(),
        };
        let mut columns = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let (key, value) = record.split_mut(field.name());
            let outcome = CommitCoordinator::new(field).pre_save(key, value).await?;
            columns.push((field.name().to_string(), outcome.stored.clone()));
            report.fields.insert(field.name().to_string(), outcome);
        }
        store.write_columns(&report.key, &columns).await?;

        info!(
            subsystem = "core",
            component = "model",
            op = "save",
            model = %self.name,
            record_id = %report.key.id,
            file_count = report.committed_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Record saved"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRecordStore, MemoryStorage};
    use crate::storage::StorageBackend;
    use crate::upload::Upload;
    use std::sync::Arc;

    fn model(storage: Arc<MemoryStorage>) -> FileModel {
        FileModel::new("document")
            .with_field(FileListField::new("files", storage.clone()).upload_to("file1"))
            .with_field(FileListField::new("images", storage).upload_to("images"))
    }

    #[tokio::test]
    async fn test_load_missing_record() {
        let model = model(Arc::new(MemoryStorage::new("/media/")));
        let store = MemoryRecordStore::new();
        assert!(model.load(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_decodes_on_read() {
        let storage = Arc::new(MemoryStorage::new("/media/"));
        storage.insert("something.txt", b"12345".to_vec()).await;
        storage.insert("else.txt", b"1".to_vec()).await;
        let model = model(storage);
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        store
            .insert_row(
                model.key(id),
                [
                    ("files", Some("[something.txt, else.txt]".to_string())),
                    ("images", None),
                ],
            )
            .await;

        let mut record = model.load(&store, id).await.unwrap().unwrap();
        assert!(matches!(record.value("files"), Some(FieldValue::Raw(_))));

        let files = model.files(&mut record, "files").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size().await.unwrap(), 5);
        assert_eq!(files[1].url().unwrap(), "/media/else.txt");
        assert!(model.files(&mut record, "images").unwrap().is_empty());
        assert!(model.files(&mut record, "nope").is_err());
    }

    #[tokio::test]
    async fn test_save_commits_and_writes_once() {
        let storage = Arc::new(MemoryStorage::new("/media/"));
        let model = model(storage.clone());
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        let mut record = model.new_record(id);
        record.set(
            "files",
            vec![
                Upload::new("a.txt", b"a".to_vec()),
                Upload::new("b.txt", b"b".to_vec()),
            ],
        );
        record.set("images", Upload::new("p.png", b"png".to_vec()));

        let report = model.save(&store, &mut record).await.unwrap();

        assert_eq!(report.stored("files"), Some("[file1/a.txt, file1/b.txt]"));
        assert_eq!(report.stored("images"), Some("images/p.png"));
        assert_eq!(report.committed_count(), 3);
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.column(&model.key(id), "files").await.as_deref(),
            Some("[file1/a.txt, file1/b.txt]")
        );
        assert!(storage.exists("images/p.png").await.unwrap());

        let mut reloaded = model.load(&store, id).await.unwrap().unwrap();
        let files = model.files(&mut reloaded, "files").unwrap();
        assert_eq!(files[1], "file1/b.txt");
    }

    #[tokio::test]
    async fn test_save_after_remove_drops_name() {
        let storage = Arc::new(MemoryStorage::new("/media/"));
        let model = model(storage.clone());
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        let mut record = model.new_record(id);
        record.set("files", vec![Upload::new("a.txt", b"a".to_vec()), Upload::new("b.txt", b"b".to_vec())]);
        model.save(&store, &mut record).await.unwrap();

        let field = model.field("files").unwrap();
        let (key, value) = record.split_mut("files");
        field.accessor().remove(Some(key), value, 0).await.unwrap();
        let report = model.save(&store, &mut record).await.unwrap();

        assert_eq!(report.stored("files"), Some("file1/b.txt"));
        assert!(!storage.exists("file1/a.txt").await.unwrap());
    }

    #[test]
    fn test_new_record_has_every_field() {
        let model = model(Arc::new(MemoryStorage::new("/media/")));
        let record = model.new_record(Uuid::nil());
        assert!(matches!(record.value("files"), Some(FieldValue::Empty)));
        assert!(matches!(record.value("images"), Some(FieldValue::Empty)));
        assert_eq!(record.key().model, "document");
    }
}
