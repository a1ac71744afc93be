//! Per-record value of a file-list field and the accessor that moves it
//! between its raw and decoded forms.

use crate::codec::StringListCodec;
use crate::error::Result;
use crate::field::FileListField;
use crate::handle::FileHandle;
use crate::record::RecordKey;
use crate::upload::Upload;

/// One element of an assigned list, before it is wrapped into a handle.
#[derive(Debug, Clone)]
pub enum ListEntry {
    /// New upload; becomes a pending handle.
    Upload(Upload),
    /// Existing handle; relinked if it lost its backend.
    Handle(FileHandle),
    /// Bare stored name; becomes a committed handle.
    Name(String),
    /// Null entry; becomes an unbound handle.
    Missing,
}

impl ListEntry {
    fn name(&self) -> Option<&str> {
        match self {
            ListEntry::Upload(upload) => Some(&upload.name),
            ListEntry::Handle(handle) => handle.name(),
            ListEntry::Name(name) => Some(name),
            ListEntry::Missing => None,
        }
    }
}

/// What a record currently holds for one file-list field.
#[derive(Debug, Clone, Default)]
pub enum FieldValue {
    /// Nothing assigned.
    #[default]
    Empty,
    /// Stored string as loaded from the column, not decoded yet.
    Raw(String),
    /// List assigned by application code, not wrapped yet.
    Assigned(Vec<ListEntry>),
    /// Handles produced by the accessor.
    Decoded(Vec<FileHandle>),
}

impl FieldValue {
    /// Names currently referenced, without touching storage.
    pub fn names(&self, codec: &StringListCodec) -> Vec<String> {
        match self {
            FieldValue::Empty => Vec::new(),
            FieldValue::Raw(raw) => codec.decode(raw),
            FieldValue::Assigned(entries) => entries
                .iter()
                .filter_map(ListEntry::name)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Decoded(handles) => handles
                .iter()
                .filter(|h| h.is_bound())
                .filter_map(|h| h.name().map(str::to_string))
                .collect(),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, FieldValue::Decoded(_))
    }
}

impl From<&str> for FieldValue {
    fn from(raw: &str) -> Self {
        FieldValue::Raw(raw.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(raw: String) -> Self {
        FieldValue::Raw(raw)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(raw: Option<String>) -> Self {
        raw.map_or(FieldValue::Empty, FieldValue::Raw)
    }
}

impl From<Upload> for FieldValue {
    fn from(upload: Upload) -> Self {
        FieldValue::Assigned(vec![ListEntry::Upload(upload)])
    }
}

impl From<FileHandle> for FieldValue {
    fn from(handle: FileHandle) -> Self {
        FieldValue::Assigned(vec![ListEntry::Handle(handle)])
    }
}

impl From<Vec<Upload>> for FieldValue {
    fn from(uploads: Vec<Upload>) -> Self {
        FieldValue::Assigned(uploads.into_iter().map(ListEntry::Upload).collect())
    }
}

impl From<Vec<FileHandle>> for FieldValue {
    fn from(handles: Vec<FileHandle>) -> Self {
        FieldValue::Assigned(handles.into_iter().map(ListEntry::Handle).collect())
    }
}

impl From<Vec<ListEntry>> for FieldValue {
    fn from(entries: Vec<ListEntry>) -> Self {
        FieldValue::Assigned(entries)
    }
}

/// Gateway between a record's raw field value and its list of handles.
#[derive(Debug, Clone, Copy)]
pub struct FileListAccessor<'a> {
    field: &'a FileListField,
}

impl<'a> FileListAccessor<'a> {
    pub fn new(field: &'a FileListField) -> Self {
        Self { field }
    }

    /// Decode or wrap `value` into handles, cache them in `value` and return
    /// them. Never fails: undecodable text becomes best-effort names.
    pub fn read<'v>(
        &self,
        record: Option<&RecordKey>,
        value: &'v mut FieldValue,
    ) -> &'v mut Vec<FileHandle> {
        match value {
            FieldValue::Decoded(handles) => {
                for handle in handles.iter_mut() {
                    self.relink(handle, record);
                }
                handles
            }
            _ => {
                let handles = match std::mem::take(value) {
                    FieldValue::Empty => Vec::new(),
                    FieldValue::Raw(raw) => self
                        .field
                        .codec()
                        .decode(&raw)
                        .into_iter()
                        .map(|name| self.field.handle(name, record))
                        .collect(),
                    FieldValue::Assigned(entries) => entries
                        .into_iter()
                        .map(|entry| self.wrap(entry, record))
                        .collect(),
                    FieldValue::Decoded(handles) => handles,
                };
                *value = FieldValue::Decoded(handles);
                self.read(record, value)
            }
        }
    }

    /// Replace the value verbatim; decoding waits for the next read.
    pub fn write(&self, value: &mut FieldValue, new_value: impl Into<FieldValue>) {
        *value = new_value.into();
    }

    /// Append an upload as a pending handle.
    pub fn push(&self, record: Option<&RecordKey>, value: &mut FieldValue, upload: Upload) {
        let handle = FileHandle::pending(upload, self.field.name(), self.field.storage(), record.cloned());
        self.read(record, value).push(handle);
    }

    /// Delete the file at `index` from storage and drop it from the list.
    ///
    /// Returns the deleted handle, or `None` if `index` is out of range. On
    /// backend failure the handle stays in the list.
    pub async fn remove(
        &self,
        record: Option<&RecordKey>,
        value: &mut FieldValue,
        index: usize,
    ) -> Result<Option<FileHandle>> {
        let handles = self.read(record, value);
        if index >= handles.len() {
            return Ok(None);
        }
        let mut handle = handles.remove(index);
        if let Err(e) = handle.delete().await {
            handles.insert(index, handle);
            return Err(e);
        }
        Ok(Some(handle))
    }

    fn wrap(&self, entry: ListEntry, record: Option<&RecordKey>) -> FileHandle {
        let field = self.field;
        match entry {
            ListEntry::Upload(upload) => {
                FileHandle::pending(upload, field.name(), field.storage(), record.cloned())
            }
            ListEntry::Handle(mut handle) => {
                self.relink(&mut handle, record);
                handle
            }
            ListEntry::Name(name) => {
                FileHandle::stored(name, field.name(), field.storage(), record.cloned())
            }
            ListEntry::Missing => FileHandle::unbound(field.name(), field.storage(), record.cloned()),
        }
    }

    fn relink(&self, handle: &mut FileHandle, record: Option<&RecordKey>) {
        if !handle.is_linked() {
            handle.link(self.field.name(), self.field.storage(), record.cloned());
        }
    }
}
