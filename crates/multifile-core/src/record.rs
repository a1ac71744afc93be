//! Records that own file-list values, and the persistence port they are
//! written through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::Result;
use crate::value::FieldValue;

/// Identifies one record. Handles keep a copy of this instead of a
/// reference to the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub model: String,
    pub id: Uuid,
}

impl RecordKey {
    pub fn new(model: impl Into<String>, id: Uuid) -> Self {
        Self {
            model: model.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.id)
    }
}

/// A record and the current value of each of its file-list fields.
#[derive(Debug, Clone)]
pub struct Record {
    key: RecordKey,
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn id(&self) -> Uuid {
        self.key.id
    }

    /// Current value of `field`, if one was ever set.
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Mutable value of `field`, created empty on first access.
    pub fn value_mut(&mut self, field: &str) -> &mut FieldValue {
        self.values.entry(field.to_string()).or_default()
    }

    /// Key and mutable value together, for accessor calls.
    pub fn split_mut(&mut self, field: &str) -> (&RecordKey, &mut FieldValue) {
        let value = self.values.entry(field.to_string()).or_default();
        (&self.key, value)
    }

    /// Replace the value of `field` verbatim.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(field.into(), value.into());
    }
}

/// Persistence port for the text columns backing file-list fields.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the raw column values of a record. `None` if the record does
    /// not exist; a `None` column value is a SQL NULL.
    async fn fetch_columns(
        &self,
        key: &RecordKey,
        columns: &[&str],
    ) -> Result<Option<BTreeMap<String, Option<String>>>>;

    /// Insert or update the given column values of a record.
    async fn write_columns(&self, key: &RecordKey, values: &[(String, String)]) -> Result<()>;
}
