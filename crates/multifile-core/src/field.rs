//! Definition of a file-list field: where uploads go, how the list is
//! encoded and which backend stores the bytes.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::codec::{ListEncoding, StringListCodec};
use crate::defaults;
use crate::error::{Error, Result};
use crate::form::MultipleFileFormField;
use crate::handle::FileHandle;
use crate::record::RecordKey;
use crate::storage::StorageBackend;
use crate::value::{FieldValue, FileListAccessor, ListEntry};

/// Computes an upload path from the owning record and the client file name.
pub type UploadPathFn = dyn Fn(Option<&RecordKey>, &str) -> String + Send + Sync;

/// Upload destination of a field.
#[derive(Clone)]
pub enum UploadTo {
    /// strftime pattern for the directory, relative to the backend root.
    Pattern(String),
    /// Callback returning the full destination name.
    Callback(Arc<UploadPathFn>),
}

impl Default for UploadTo {
    fn default() -> Self {
        UploadTo::Pattern(defaults::UPLOAD_TO.to_string())
    }
}

impl fmt::Debug for UploadTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadTo::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            UploadTo::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// What to do with a handle that has no name when the list is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingNamePolicy {
    /// Leave it out of the stored string and log a warning.
    #[default]
    Omit,
    /// Abort the save with [`Error::MissingName`].
    Fail,
}

impl FromStr for MissingNamePolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "omit" => Ok(Self::Omit),
            "fail" => Ok(Self::Fail),
            other => Err(Error::Config(format!("unknown missing-name policy: {}", other))),
        }
    }
}

impl fmt::Display for MissingNamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omit => write!(f, "omit"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Result of a field system check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckMessage {
    pub id: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

/// Serializable description of a field, enough to rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub blank: bool,
    #[serde(default)]
    pub encoding: ListEncoding,
}

/// A file-list field definition. Holds no per-record state.
#[derive(Clone)]
pub struct FileListField {
    name: String,
    upload_to: UploadTo,
    storage: Arc<dyn StorageBackend>,
    max_length: usize,
    blank: bool,
    unique: bool,
    primary_key: bool,
    allow_empty_file: bool,
    encoding: ListEncoding,
    missing_name: MissingNamePolicy,
}

impl fmt::Debug for FileListField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileListField")
            .field("name", &self.name)
            .field("upload_to", &self.upload_to)
            .field("max_length", &self.max_length)
            .field("encoding", &self.encoding)
            .field("missing_name", &self.missing_name)
            .finish()
    }
}

impl FileListField {
    /// Create a field with default settings.
    pub fn new(name: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            name: name.into(),
            upload_to: UploadTo::default(),
            storage,
            max_length: defaults::MAX_LENGTH,
            blank: false,
            unique: false,
            primary_key: false,
            allow_empty_file: defaults::ALLOW_EMPTY_FILE,
            encoding: ListEncoding::default(),
            missing_name: MissingNamePolicy::default(),
        }
    }

    /// Set the strftime directory pattern.
    pub fn upload_to(mut self, pattern: impl Into<String>) -> Self {
        self.upload_to = UploadTo::Pattern(pattern.into());
        self
    }

    /// Compute destination names with a callback.
    pub fn upload_with<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&RecordKey>, &str) -> String + Send + Sync + 'static,
    {
        self.upload_to = UploadTo::Callback(Arc::new(f));
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = n;
        self
    }

    pub fn blank(mut self, blank: bool) -> Self {
        self.blank = blank;
        self
    }

    /// Not supported; reported by [`FileListField::check`].
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Not supported; reported by [`FileListField::check`].
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn allow_empty_file(mut self, allow: bool) -> Self {
        self.allow_empty_file = allow;
        self
    }

    pub fn encoding(mut self, encoding: ListEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn missing_name(mut self, policy: MissingNamePolicy) -> Self {
        self.missing_name = policy;
        self
    }

    /// Same settings under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut field = self.clone();
        field.name = name.into();
        field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }

    pub fn get_max_length(&self) -> usize {
        self.max_length
    }

    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn missing_name_policy(&self) -> MissingNamePolicy {
        self.missing_name
    }

    pub fn codec(&self) -> StringListCodec {
        StringListCodec::new(self.encoding)
    }

    pub fn accessor(&self) -> FileListAccessor<'_> {
        FileListAccessor::new(self)
    }

    /// Upload directory for `now`: the strftime pattern, normalized.
    /// Empty when the field uploads to the backend root.
    pub fn directory_name<Tz>(&self, now: &DateTime<Tz>) -> Result<String>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let pattern = match &self.upload_to {
            UploadTo::Pattern(p) => p,
            UploadTo::Callback(_) => return Ok(String::new()),
        };
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Config(format!(
                "invalid upload_to pattern for '{}': {}",
                self.name, pattern
            )));
        }
        let formatted = now.format(pattern).to_string();
        Ok(normalize_path(&formatted))
    }

    /// Sanitized base name of a client-supplied file name.
    pub fn filename(&self, name: &str) -> String {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        normalize_path(&self.storage.get_valid_name(base))
    }

    /// Destination name for a new upload.
    pub fn generate_filename<Tz>(
        &self,
        record: Option<&RecordKey>,
        name: &str,
        now: &DateTime<Tz>,
    ) -> Result<String>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        if let UploadTo::Callback(f) = &self.upload_to {
            return Ok(normalize_path(&f(record, name)));
        }
        let dir = self.directory_name(now)?;
        let file = self.filename(name);
        if dir.is_empty() {
            Ok(file)
        } else {
            Ok(format!("{}/{}", dir, file))
        }
    }

    /// Configuration problems of this field.
    pub fn check(&self) -> Vec<CheckMessage> {
        let mut messages = Vec::new();
        if self.unique {
            messages.push(CheckMessage {
                id: "fields.E200",
                message: "'unique' is not a valid argument for a FileListField.".to_string(),
                hint: None,
            });
        }
        if self.primary_key {
            messages.push(CheckMessage {
                id: "fields.E201",
                message: "'primary_key' is not a valid argument for a FileListField.".to_string(),
                hint: None,
            });
        }
        if let UploadTo::Pattern(p) = &self.upload_to {
            if StrftimeItems::new(p).any(|item| matches!(item, Item::Error)) {
                messages.push(CheckMessage {
                    id: "fields.E202",
                    message: format!("'upload_to' is not a valid strftime pattern: {}", p),
                    hint: Some("Escape literal '%' as '%%'.".to_string()),
                });
            }
        }
        messages
    }

    /// Describe the field; defaults are left out.
    pub fn deconstruct(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            kind: "FileListField".to_string(),
            upload_to: match &self.upload_to {
                UploadTo::Pattern(p) => Some(p.clone()),
                UploadTo::Callback(_) => None,
            },
            max_length: (self.max_length != defaults::MAX_LENGTH).then_some(self.max_length),
            blank: self.blank,
            encoding: self.encoding,
        }
    }

    /// Form field validating submissions for this field. An existing value
    /// (`has_initial`) makes new uploads optional.
    pub fn formfield(&self, has_initial: bool) -> MultipleFileFormField {
        MultipleFileFormField {
            max_length: Some(self.max_length),
            allow_empty_file: self.allow_empty_file,
            required: !(has_initial || self.blank),
        }
    }

    /// Apply cleaned form data. `None` means "no change"; an empty list
    /// clears the value.
    pub fn save_form_data(&self, value: &mut FieldValue, data: Option<Vec<ListEntry>>) {
        let Some(entries) = data else {
            return;
        };
        if entries.is_empty() {
            *value = FieldValue::Empty;
        } else {
            *value = FieldValue::Assigned(entries);
        }
    }

    /// Stored string for the current names, without committing anything.
    pub fn get_prep_value(&self, value: &FieldValue) -> String {
        let codec = self.codec();
        codec.encode(&value.names(&codec))
    }

    /// Wrap a stored name in a committed handle of this field.
    pub fn handle(&self, name: impl Into<String>, record: Option<&RecordKey>) -> FileHandle {
        FileHandle::stored(name, self.name.clone(), self.storage(), record.cloned())
    }
}

/// POSIX-style path normalization: drops empty and `.` segments and folds
/// `..` into its parent. Returns an empty string for the current directory.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::upload::Upload;
    use chrono::Utc;
    use uuid::Uuid;

    fn storage() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new("/media/"))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let field = FileListField::new("files", storage());
        assert_eq!(field.name(), "files");
        assert_eq!(field.get_max_length(), 100);
        assert_eq!(field.codec().encoding(), ListEncoding::Legacy);
        assert_eq!(field.missing_name_policy(), MissingNamePolicy::Omit);
        assert!(field.check().is_empty());
    }

    #[test]
    fn test_directory_name_formats_pattern() {
        let field = FileListField::new("files", storage()).upload_to("docs/%Y/%m/./");
        assert_eq!(field.directory_name(&fixed_now()).unwrap(), "docs/2024/03");
    }

    #[test]
    fn test_directory_name_invalid_pattern() {
        let field = FileListField::new("files", storage()).upload_to("docs/100%");
        assert!(matches!(
            field.directory_name(&fixed_now()),
            Err(Error::Config(_))
        ));
        let ids: Vec<_> = field.check().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["fields.E202"]);
    }

    #[test]
    fn test_generate_filename_joins_directory_and_sanitized_basename() {
        let field = FileListField::new("files", storage()).upload_to("file1/%Y");
        let name = field
            .generate_filename(None, "C:\\Users\\me\\my report.pdf", &fixed_now())
            .unwrap();
        assert_eq!(name, "file1/2024/my_report.pdf");
    }

    #[test]
    fn test_generate_filename_at_root() {
        let field = FileListField::new("files", storage());
        let name = field
            .generate_filename(None, "../../etc/passwd", &fixed_now())
            .unwrap();
        assert_eq!(name, "passwd");
    }

    #[test]
    fn test_generate_filename_callback() {
        let field = FileListField::new("files", storage()).upload_with(|record, name| {
            let id = record.map(|r| r.id.to_string()).unwrap_or_default();
            format!("by-record/{}/{}", id, name)
        });
        let key = RecordKey::new("document", Uuid::nil());
        let name = field
            .generate_filename(Some(&key), "a.txt", &fixed_now())
            .unwrap();
        assert_eq!(
            name,
            "by-record/00000000-0000-0000-0000-000000000000/a.txt"
        );
    }

    #[test]
    fn test_check_reports_unique_and_primary_key() {
        let field = FileListField::new("files", storage())
            .unique(true)
            .primary_key(true);
        let ids: Vec<_> = field.check().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["fields.E200", "fields.E201"]);
    }

    #[test]
    fn test_deconstruct_omits_default_max_length() {
        let field = FileListField::new("files", storage()).upload_to("file1");
        let desc = field.deconstruct();
        assert_eq!(desc.max_length, None);
        assert_eq!(desc.upload_to.as_deref(), Some("file1"));
        let json = serde_json::to_value(&desc).unwrap();
        assert!(json.get("max_length").is_none());

        let desc = field.max_length(255).deconstruct();
        assert_eq!(desc.max_length, Some(255));
    }

    #[test]
    fn test_formfield_required_unless_initial_or_blank() {
        let field = FileListField::new("files", storage());
        assert!(field.formfield(false).required);
        assert!(!field.formfield(true).required);
        assert_eq!(field.formfield(false).max_length, Some(100));
        assert!(!field.blank(true).formfield(false).required);
    }

    #[test]
    fn test_save_form_data() {
        let field = FileListField::new("files", storage());
        let mut value = FieldValue::from("a.txt");

        field.save_form_data(&mut value, None);
        assert!(matches!(&value, FieldValue::Raw(raw) if raw == "a.txt"));

        field.save_form_data(
            &mut value,
            Some(vec![
                ListEntry::Handle(field.handle("a.txt", None)),
                ListEntry::Upload(Upload::new("b.txt", b"b".to_vec())),
            ]),
        );
        assert_eq!(field.get_prep_value(&value), "[a.txt, b.txt]");

        field.save_form_data(&mut value, Some(Vec::new()));
        assert!(matches!(value, FieldValue::Empty));
        assert_eq!(field.get_prep_value(&value), "");
    }

    #[test]
    fn test_missing_name_policy_parse() {
        assert_eq!("fail".parse::<MissingNamePolicy>().unwrap(), MissingNamePolicy::Fail);
        assert_eq!(" Omit ".parse::<MissingNamePolicy>().unwrap(), MissingNamePolicy::Omit);
        assert!("drop".parse::<MissingNamePolicy>().is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b//c/"), "a/b/c");
        assert_eq!(normalize_path("a/../b"), "b");
        assert_eq!(normalize_path("../x"), "../x");
        assert_eq!(normalize_path("/../x"), "/x");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path(""), "");
    }
}
