//! Form-level validation of submitted file lists.
//!
//! Validation runs before anything reaches storage, so a rejected
//! submission never leaves partial commits behind.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::upload::UploadLike;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_INVALID: &str = "No file was submitted. Check the encoding type on the form.";
pub const MSG_EMPTY: &str = "The submitted file is empty.";

/// One failed check, identified by `code`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ValidationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn required() -> Self {
        Self::new("required", MSG_REQUIRED)
    }

    fn invalid() -> Self {
        Self::new("invalid", MSG_INVALID)
    }

    fn empty() -> Self {
        Self::new("empty", MSG_EMPTY)
    }

    fn max_length(max: f64, length: usize) -> Self {
        Self::new(
            "max_length",
            format!(
                "Ensure this filename has at most {} characters (it has {}).",
                max.floor() as u64,
                length
            ),
        )
        .with_param("max", max)
        .with_param("length", length)
    }
}

/// Every error collected for one submission, in entry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.code.as_str()).collect()
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates a list of submitted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleFileFormField {
    /// Limit on the whole encoded value, shared evenly among the files.
    pub max_length: Option<usize>,
    pub allow_empty_file: bool,
    pub required: bool,
}

impl Default for MultipleFileFormField {
    fn default() -> Self {
        Self {
            max_length: None,
            allow_empty_file: crate::defaults::ALLOW_EMPTY_FILE,
            required: true,
        }
    }
}

impl MultipleFileFormField {
    /// Validate the submission and hand it back unchanged.
    ///
    /// `None` and an empty list both count as "nothing submitted". Each entry
    /// contributes at most one error.
    pub fn clean<F: UploadLike>(
        &self,
        data: Option<Vec<F>>,
    ) -> Result<Option<Vec<F>>, ValidationErrors> {
        let files = match data {
            Some(files) if !files.is_empty() => files,
            _ if self.required => return Err(vec![ValidationError::required()].into()),
            _ => return Ok(None),
        };

        let count = files.len();
        let mut errors = ValidationErrors::new();
        for file in &files {
            if let Some(error) = self.check_entry(file, count) {
                errors.push(error);
            }
        }
        if errors.is_empty() {
            Ok(Some(files))
        } else {
            Err(errors)
        }
    }

    fn check_entry<F: UploadLike>(&self, file: &F, count: usize) -> Option<ValidationError> {
        let (Some(name), Some(size)) = (file.upload_name(), file.upload_size()) else {
            return Some(ValidationError::invalid());
        };
        if let Some(max_length) = self.max_length {
            let share = max_length as f64 / count as f64;
            let length = name.chars().count();
            if length as f64 > share {
                return Some(ValidationError::max_length(share, length));
            }
        }
        if name.is_empty() {
            return Some(ValidationError::invalid());
        }
        if !self.allow_empty_file && size == 0 {
            return Some(ValidationError::empty());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::Upload;

    #[derive(Debug)]
    struct Broken;

    impl UploadLike for Broken {
        fn upload_name(&self) -> Option<&str> {
            Some("broken.txt")
        }

        fn upload_size(&self) -> Option<u64> {
            None
        }
    }

    fn form(max_length: Option<usize>) -> MultipleFileFormField {
        MultipleFileFormField {
            max_length,
            ..Default::default()
        }
    }

    #[test]
    fn test_required_when_nothing_submitted() {
        let err = form(None).clean::<Upload>(None).unwrap_err();
        assert_eq!(err.codes(), vec!["required"]);
        let err = form(None).clean::<Upload>(Some(Vec::new())).unwrap_err();
        assert_eq!(err.codes(), vec!["required"]);
    }

    #[test]
    fn test_optional_returns_none() {
        let field = MultipleFileFormField {
            required: false,
            ..Default::default()
        };
        assert_eq!(field.clean::<Upload>(None).unwrap(), None);
    }

    #[test]
    fn test_valid_uploads_pass_through() {
        let files = vec![
            Upload::new("a.txt", b"a".to_vec()),
            Upload::new("b.txt", b"b".to_vec()),
        ];
        let cleaned = form(Some(100)).clean(Some(files.clone())).unwrap();
        assert_eq!(cleaned, Some(files));
    }

    #[test]
    fn test_max_length_is_shared_between_files() {
        // 100 / 2 = 50 characters per name
        let long = format!("{}.txt", "x".repeat(47));
        let files = vec![
            Upload::new(long.clone(), b"a".to_vec()),
            Upload::new("b.txt", b"b".to_vec()),
        ];
        let err = form(Some(100)).clean(Some(files)).unwrap_err();
        assert_eq!(err.codes(), vec!["max_length"]);
        let first = err.iter().next().unwrap();
        assert_eq!(first.params["length"], serde_json::json!(51));
        assert_eq!(first.params["max"], serde_json::json!(50.0));
        assert_eq!(
            first.message,
            "Ensure this filename has at most 50 characters (it has 51)."
        );

        // Same name alone fits.
        assert!(form(Some(100))
            .clean(Some(vec![Upload::new(long, b"a".to_vec())]))
            .is_ok());
    }

    #[test]
    fn test_max_length_uses_true_division() {
        // 10 / 3 = 3.33, so a 4-character name fails and 3 characters pass
        let files = vec![
            Upload::new("abc", b"1".to_vec()),
            Upload::new("abcd", b"1".to_vec()),
            Upload::new("ab", b"1".to_vec()),
        ];
        let err = form(Some(10)).clean(Some(files)).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(
            err.iter().next().unwrap().message,
            "Ensure this filename has at most 3 characters (it has 4)."
        );
    }

    #[test]
    fn test_empty_name_and_empty_file() {
        let files = vec![
            Upload::new("", b"a".to_vec()),
            Upload::new("zero.txt", Vec::new()),
        ];
        let err = form(None).clean(Some(files)).unwrap_err();
        assert_eq!(err.codes(), vec!["invalid", "empty"]);
    }

    #[test]
    fn test_allow_empty_file() {
        let field = MultipleFileFormField {
            allow_empty_file: true,
            ..Default::default()
        };
        assert!(field.clean(Some(vec![Upload::new("zero.txt", Vec::new())])).is_ok());
    }

    #[test]
    fn test_malformed_entry_is_invalid() {
        let err = form(Some(100)).clean(Some(vec![Broken])).unwrap_err();
        assert_eq!(err.codes(), vec!["invalid"]);
        assert_eq!(err.to_string(), MSG_INVALID);
    }

    #[test]
    fn test_errors_serialize_as_list() {
        let errors = ValidationErrors::from(vec![ValidationError::new("empty", MSG_EMPTY)]);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "code": "empty", "message": MSG_EMPTY }])
        );
    }
}
