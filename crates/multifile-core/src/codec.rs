//! Stored-string codec for file lists.
//!
//! A file list is persisted in a single text column. The legacy layout is:
//!
//! - `""` for no files
//! - `name` (no brackets) for exactly one file, so plain single-file columns
//!   keep loading
//! - `[a, b, c]` for two or more files
//!
//! Decoding also accepts what older writers produced: quoted entries
//! (`['a', 'b']`) and unicode-prefixed entries (`[u'a', u'b']`).
//!
//! Names are split on `", "`. A name that itself contains `", "` cannot
//! round-trip through the legacy layout; [`ListEncoding::Json`] is the opt-in
//! alternative for new data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

use crate::defaults::LIST_SEPARATOR;
use crate::error::Error;

/// Layout used when encoding a list of names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListEncoding {
    /// Bracketed, comma-space separated, no quoting.
    #[default]
    Legacy,
    /// JSON array of strings. Decoding falls back to the legacy parser.
    Json,
}

impl FromStr for ListEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown list encoding: {}", other))),
        }
    }
}

impl fmt::Display for ListEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Encodes and decodes the stored string of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringListCodec {
    encoding: ListEncoding,
}

impl StringListCodec {
    pub fn new(encoding: ListEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> ListEncoding {
        self.encoding
    }

    /// Encode an ordered list of names into the stored string.
    pub fn encode<S: AsRef<str>>(&self, names: &[S]) -> String {
        match self.encoding {
            ListEncoding::Legacy => encode(names),
            ListEncoding::Json => encode_json(names),
        }
    }

    /// Decode a stored string back into an ordered list of names.
    ///
    /// Never fails: anything unparseable is kept as a best-effort name.
    pub fn decode(&self, raw: &str) -> Vec<String> {
        match self.encoding {
            ListEncoding::Legacy => decode(raw),
            ListEncoding::Json => decode_json(raw).unwrap_or_else(|| decode(raw)),
        }
    }
}

/// Encode names using the legacy layout.
pub fn encode<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        _ => {
            let joined = names
                .iter()
                .map(|n| n.as_ref())
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR);
            format!("[{}]", joined)
        }
    }
}

/// Decode a legacy stored string.
pub fn decode(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut body = raw;
    if let Some(rest) = body.strip_prefix('[') {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix(']') {
        body = rest;
    }

    body.split(LIST_SEPARATOR).filter_map(decode_token).collect()
}

/// Clean one split token: trim, drop a `u` before a quote, then strip at
/// most one leading and one trailing single quote.
fn decode_token(token: &str) -> Option<String> {
    let mut name = token.trim();
    if name.is_empty() {
        return None;
    }
    if name.starts_with("u'") {
        name = &name[1..];
    }
    if let Some(rest) = name.strip_prefix('\'') {
        name = rest;
    }
    if let Some(rest) = name.strip_suffix('\'') {
        name = rest;
    }
    trace!(token = %token, name = %name, "codec: token");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn encode_json<S: AsRef<str>>(names: &[S]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
    // A Vec<&str> always serializes.
    serde_json::to_string(&names).unwrap_or_default()
}

fn decode_json(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    serde_json::from_str::<Vec<String>>(trimmed).ok()
}
