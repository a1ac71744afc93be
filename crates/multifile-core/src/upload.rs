//! Uploaded file content and the multi-value map of submitted uploads.

use std::collections::BTreeMap;

/// A file received from a form submission that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Upload {
    /// Client-supplied file name (may include directories).
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
    /// Save under `name` as-is instead of generating an upload path.
    pub preserve_name: bool,
}

impl Upload {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            content_type: None,
            preserve_name: false,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Mark the name as already backend-qualified.
    pub fn preserving_name(mut self) -> Self {
        self.preserve_name = true;
        self
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Anything that can be validated as a submitted file.
///
/// Name or size may be absent for malformed submissions.
pub trait UploadLike {
    fn upload_name(&self) -> Option<&str>;
    fn upload_size(&self) -> Option<u64>;
}

impl UploadLike for Upload {
    fn upload_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn upload_size(&self) -> Option<u64> {
        Some(self.size())
    }
}

/// Submitted uploads keyed by form field name; one name can carry many files.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    entries: BTreeMap<String, Vec<Upload>>,
}

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one upload under `field`, keeping earlier ones.
    pub fn append(&mut self, field: impl Into<String>, upload: Upload) {
        self.entries.entry(field.into()).or_default().push(upload);
    }

    /// All uploads under `field`, or `None` if the field was not submitted.
    pub fn get_list(&self, field: &str) -> Option<&[Upload]> {
        self.entries.get(field).map(Vec::as_slice)
    }

    /// The last upload under `field`.
    pub fn get(&self, field: &str) -> Option<&Upload> {
        self.entries.get(field).and_then(|list| list.last())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl FromIterator<(String, Upload)> for UploadedFiles {
    fn from_iter<I: IntoIterator<Item = (String, Upload)>>(iter: I) -> Self {
        let mut files = Self::new();
        for (field, upload) in iter {
            files.append(field, upload);
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_size_and_flags() {
        let upload = Upload::new("a.txt", b"abc".to_vec()).with_content_type("text/plain");
        assert_eq!(upload.size(), 3);
        assert_eq!(upload.content_type.as_deref(), Some("text/plain"));
        assert!(!upload.preserve_name);
        assert!(upload.preserving_name().preserve_name);
    }

    #[test]
    fn test_uploaded_files_multi_value() {
        let mut files = UploadedFiles::new();
        assert!(files.is_empty());
        files.append("docs", Upload::new("a.txt", b"a".to_vec()));
        files.append("docs", Upload::new("b.txt", b"b".to_vec()));
        files.append("cover", Upload::new("c.png", b"c".to_vec()));

        assert_eq!(files.len(), 3);
        let docs = files.get_list("docs").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "a.txt");
        assert_eq!(files.get("docs").unwrap().name, "b.txt");
        assert!(files.get_list("missing").is_none());
    }
}
