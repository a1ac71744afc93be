//! In-memory storage and record store.
//!
//! Useful for tests and for ephemeral setups. Both are cheap to clone behind
//! an `Arc` and safe to share between tasks.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{RecordKey, RecordStore};
use crate::storage::{join_url, numbered_name, FileStream, StorageBackend};

/// Storage backend keeping every object in a map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    base_url: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    opens: AtomicUsize,
}

impl MemoryStorage {
    /// Create an empty store whose URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(BTreeMap::new()),
            opens: AtomicUsize::new(0),
        }
    }

    /// Put an object in place directly, bypassing name selection.
    pub async fn insert(&self, name: impl Into<String>, content: Vec<u8>) {
        self.objects.lock().await.insert(name.into(), content);
    }

    /// Names of all stored objects, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Number of `open` calls served so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn open(&self, name: &str) -> Result<FileStream> {
        let objects = self.objects.lock().await;
        let data = objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("file {}", name)))?;
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(FileStream::new(data))
    }

    async fn save(&self, name: &str, content: &[u8], max_length: Option<usize>) -> Result<String> {
        // Choosing the name and inserting happen under one lock.
        let mut objects = self.objects.lock().await;
        let mut attempt = 0usize;
        let name = loop {
            let candidate = numbered_name(name, attempt, max_length)?;
            if !objects.contains_key(&candidate) {
                break candidate;
            }
            attempt += 1;
        };
        debug!(file_name = %name, size_bytes = content.len(), "memory_storage: save");
        objects.insert(name.clone(), content.to_vec());
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.objects.lock().await.remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects.lock().await.contains_key(name))
    }

    async fn size(&self, name: &str) -> Result<u64> {
        self.objects
            .lock()
            .await
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| Error::NotFound(format!("file {}", name)))
    }

    fn path(&self, _name: &str) -> Result<PathBuf> {
        Err(Error::Storage(
            "This backend doesn't support absolute paths.".to_string(),
        ))
    }

    fn url(&self, name: &str) -> Result<String> {
        Ok(join_url(&self.base_url, name))
    }
}

/// Record store keeping rows in a map.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: Mutex<BTreeMap<RecordKey, BTreeMap<String, Option<String>>>>,
    writes: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row with raw column values.
    pub async fn insert_row<I, K>(&self, key: RecordKey, columns: I)
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let row = columns.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.rows.lock().await.insert(key, row);
    }

    /// Raw value of one column, if the row and column exist.
    pub async fn column(&self, key: &RecordKey, column: &str) -> Option<String> {
        self.rows
            .lock()
            .await
            .get(key)
            .and_then(|row| row.get(column).cloned())
            .flatten()
    }

    /// Number of `write_columns` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_columns(
        &self,
        key: &RecordKey,
        columns: &[&str],
    ) -> Result<Option<BTreeMap<String, Option<String>>>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(key).map(|row| {
            columns
                .iter()
                .map(|c| (c.to_string(), row.get(*c).cloned().flatten()))
                .collect()
        }))
    }

    async fn write_columns(&self, key: &RecordKey, values: &[(String, String)]) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let row = rows.entry(key.clone()).or_default();
        for (column, value) in values {
            row.insert(column.clone(), Some(value.clone()));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
