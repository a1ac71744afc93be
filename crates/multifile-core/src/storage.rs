//! Storage backend abstraction.
//!
//! Handles never touch bytes at rest directly; every open, save, delete and
//! size query goes through a [`StorageBackend`]. The backend owns naming
//! rules: it sanitizes names and picks a free name on save.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::defaults::FALLBACK_FILE_NAME;
use crate::error::{Error, Result};

static INVALID_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^-\w.]").unwrap());

/// Storage backend trait for different storage implementations.
///
/// Allows abstracting over filesystem, in-memory or object stores.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open the object stored under `name`.
    async fn open(&self, name: &str) -> Result<FileStream>;

    /// Persist `content` under a name derived from `name` and return the
    /// name actually used.
    async fn save(&self, name: &str, content: &[u8], max_length: Option<usize>) -> Result<String>;

    /// Delete the object stored under `name`. Missing objects are not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Check whether an object is stored under `name`.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Size in bytes of the object stored under `name`.
    async fn size(&self, name: &str) -> Result<u64>;

    /// Local filesystem path of `name`, for backends that have one.
    fn path(&self, name: &str) -> Result<PathBuf>;

    /// Public URL of `name`.
    fn url(&self, name: &str) -> Result<String>;

    /// Sanitize a single file name for this backend.
    fn get_valid_name(&self, name: &str) -> String {
        valid_name(name)
    }

    /// Return a name based on `name` that is free in this backend.
    ///
    /// Appends `_1`, `_2`, ... to the stem until the name is unused, and
    /// shortens the stem when `max_length` would be exceeded.
    async fn get_available_name(&self, name: &str, max_length: Option<usize>) -> Result<String> {
        let mut attempt = 0usize;
        loop {
            let candidate = numbered_name(name, attempt, max_length)?;
            if !self.exists(&candidate).await? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }
}

/// Default name sanitizer: trim, spaces to underscores, drop everything that
/// is not alphanumeric, `-`, `_` or `.`.
pub fn valid_name(name: &str) -> String {
    let spaced = name.trim().replace(' ', "_");
    let cleaned = INVALID_NAME_CHARS.replace_all(&spaced, "").into_owned();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Build the `attempt`-th candidate for `name`, truncated to `max_length`.
///
/// Attempt 0 is the name itself.
pub fn numbered_name(name: &str, attempt: usize, max_length: Option<usize>) -> Result<String> {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name),
    };
    let (stem, ext) = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file, None),
    };

    let suffix = if attempt == 0 {
        String::new()
    } else {
        format!("_{}", attempt)
    };
    let assemble = |stem: &str| -> String {
        let mut out = String::new();
        if let Some(dir) = dir {
            out.push_str(dir);
            out.push('/');
        }
        out.push_str(stem);
        out.push_str(&suffix);
        if let Some(ext) = ext {
            out.push('.');
            out.push_str(ext);
        }
        out
    };

    let candidate = assemble(stem);
    let Some(max) = max_length else {
        return Ok(candidate);
    };
    let len = candidate.chars().count();
    if len <= max {
        return Ok(candidate);
    }

    let overflow = len - max;
    let stem_len = stem.chars().count();
    if overflow >= stem_len {
        return Err(Error::Storage(format!(
            "Storage can not find an available filename for \"{}\". \
             Please make sure that the corresponding file field allows \
             sufficient \"max_length\".",
            name
        )));
    }
    let truncated: String = stem.chars().take(stem_len - overflow).collect();
    Ok(assemble(&truncated))
}

/// Join a base URL and a storage name, percent-encoding each segment.
pub fn join_url(base_url: &str, name: &str) -> String {
    let encoded = name
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if base_url.ends_with('/') {
        format!("{}{}", base_url, encoded)
    } else {
        format!("{}/{}", base_url, encoded)
    }
}

/// In-memory readable stream over an opened file.
///
/// Reading after [`FileStream::close`] fails; reopening through the handle
/// rewinds instead of fetching the bytes again.
#[derive(Debug, Clone, Default)]
pub struct FileStream {
    cursor: Cursor<Vec<u8>>,
    closed: bool,
}

impl FileStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
            closed: false,
        }
    }

    /// Total length of the underlying content.
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Move back to the start and reopen if closed.
    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
        self.closed = false;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Read everything from the current position.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }

    /// The complete content, regardless of position.
    pub fn content(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "I/O operation on closed file",
            ));
        }
        self.cursor.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_slash_handling() {
        assert_eq!(join_url("/media", "a.txt"), "/media/a.txt");
        assert_eq!(join_url("https://cdn.example.com/", "/x/y.txt"), "https://cdn.example.com/x/y.txt");
    }

    #[test]
    fn test_valid_name_replaces_and_strips() {
        assert_eq!(valid_name("  my report (final).pdf "), "my_report_final.pdf");
        assert_eq!(valid_name("résumé.txt"), "résumé.txt");
        assert_eq!(valid_name("a/b\\c.txt"), "abc.txt");
    }

    #[test]
    fn test_valid_name_fallback() {
        assert_eq!(valid_name("***"), "file");
        assert_eq!(valid_name(".."), "file");
    }

    #[test]
    fn test_numbered_name_first_attempt_is_name() {
        assert_eq!(numbered_name("dir/a.txt", 0, None).unwrap(), "dir/a.txt");
    }

    #[test]
    fn test_numbered_name_suffix_before_extension() {
        assert_eq!(numbered_name("dir/a.txt", 2, None).unwrap(), "dir/a_2.txt");
        assert_eq!(numbered_name("README", 1, None).unwrap(), "README_1");
        assert_eq!(numbered_name(".env", 1, None).unwrap(), ".env_1");
        assert_eq!(
            numbered_name("archive.tar.gz", 1, None).unwrap(),
            "archive.tar_1.gz"
        );
    }

    #[test]
    fn test_numbered_name_truncates_stem() {
        let name = numbered_name("dir/abcdefgh.txt", 1, Some(14)).unwrap();
        assert_eq!(name, "dir/abcd_1.txt");
        assert_eq!(name.chars().count(), 14);
    }

    #[test]
    fn test_numbered_name_fails_when_stem_exhausted() {
        let err = numbered_name("dir/ab.txt", 0, Some(7)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_file_stream_read_rewind_close() {
        let mut stream = FileStream::new(b"hello".to_vec());
        assert_eq!(stream.len(), 5);
        assert_eq!(stream.read_all().unwrap(), b"hello");
        assert_eq!(stream.position(), 5);
        assert!(stream.read_all().unwrap().is_empty());

        stream.rewind();
        assert_eq!(stream.read_all().unwrap(), b"hello");

        stream.close();
        assert!(stream.is_closed());
        assert!(stream.read_all().is_err());
        assert_eq!(stream.content(), b"hello");
    }
}
