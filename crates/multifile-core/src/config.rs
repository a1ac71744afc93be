//! Configuration for file-list fields and the storage they use.
//!
//! Loaded from:
//! - TOML files with a `[multifile]` table
//! - Environment variables (`MULTIFILE_*` prefixed)
//!
//! # Example
//!
//! ```rust,no_run
//! use multifile_core::config::MultifileConfig;
//!
//! let config = MultifileConfig::from_file(std::path::Path::new("multifile.toml"))
//!     .expect("Failed to load");
//! let config = MultifileConfig::from_env().expect("Invalid environment");
//! ```

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::codec::ListEncoding;
use crate::defaults;
use crate::field::{FileListField, MissingNamePolicy};
use crate::storage::StorageBackend;

pub const ENV_MEDIA_ROOT: &str = "MULTIFILE_MEDIA_ROOT";
pub const ENV_MEDIA_URL: &str = "MULTIFILE_MEDIA_URL";
pub const ENV_UPLOAD_TO: &str = "MULTIFILE_UPLOAD_TO";
pub const ENV_MAX_LENGTH: &str = "MULTIFILE_MAX_LENGTH";
pub const ENV_ALLOW_EMPTY_FILE: &str = "MULTIFILE_ALLOW_EMPTY_FILE";
pub const ENV_ENCODING: &str = "MULTIFILE_ENCODING";
pub const ENV_MISSING_NAME: &str = "MULTIFILE_MISSING_NAME";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings shared by the fields of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultifileConfig {
    /// Directory the filesystem backend stores files under.
    pub media_root: PathBuf,
    /// Public URL prefix of stored files.
    pub media_url: String,
    /// strftime pattern for upload directories.
    pub upload_to: String,
    pub max_length: usize,
    pub allow_empty_file: bool,
    pub encoding: ListEncoding,
    pub missing_name: MissingNamePolicy,
}

impl Default for MultifileConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(defaults::MEDIA_ROOT),
            media_url: defaults::MEDIA_URL.to_string(),
            upload_to: defaults::UPLOAD_TO.to_string(),
            max_length: defaults::MAX_LENGTH,
            allow_empty_file: defaults::ALLOW_EMPTY_FILE,
            encoding: ListEncoding::default(),
            missing_name: MissingNamePolicy::default(),
        }
    }
}

impl MultifileConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_length == 0 {
            return Err(ConfigError::Validation(
                "max_length must be greater than 0".to_string(),
            ));
        }
        if self.media_url.is_empty() {
            return Err(ConfigError::Validation(
                "media_url must not be empty".to_string(),
            ));
        }
        if StrftimeItems::new(&self.upload_to).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Validation(format!(
                "upload_to is not a valid strftime pattern: {}",
                self.upload_to
            )));
        }
        Ok(())
    }

    /// Load from `path` when it exists, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading multifile configuration from file");
                Self::from_file(path)
            }
            _ => {
                debug!("No configuration file, using environment");
                Self::from_env()
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse the `[multifile]` table of a TOML document. A missing table
    /// yields the defaults.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        #[derive(Deserialize)]
        struct TomlRoot {
            #[serde(default)]
            multifile: MultifileConfig,
        }

        let root: TomlRoot = toml::from_str(content)?;
        root.multifile.validate()?;
        Ok(root.multifile)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from a key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_MEDIA_ROOT) {
            config.media_root = PathBuf::from(root);
        }
        if let Some(url) = lookup(ENV_MEDIA_URL) {
            config.media_url = url;
        }
        if let Some(pattern) = lookup(ENV_UPLOAD_TO) {
            config.upload_to = pattern;
        }
        if let Some(raw) = lookup(ENV_MAX_LENGTH) {
            config.max_length = raw.trim().parse().map_err(|_| invalid(ENV_MAX_LENGTH, &raw))?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_EMPTY_FILE) {
            config.allow_empty_file = parse_bool(&raw).ok_or_else(|| invalid(ENV_ALLOW_EMPTY_FILE, &raw))?;
        }
        if let Some(raw) = lookup(ENV_ENCODING) {
            config.encoding = raw.parse().map_err(|_| invalid(ENV_ENCODING, &raw))?;
        }
        if let Some(raw) = lookup(ENV_MISSING_NAME) {
            config.missing_name = raw.parse().map_err(|_| invalid(ENV_MISSING_NAME, &raw))?;
        }
        config.validate()?;
        Ok(config)
    }

    /// A field using these settings.
    pub fn field(&self, name: impl Into<String>, storage: Arc<dyn StorageBackend>) -> FileListField {
        FileListField::new(name, storage)
            .upload_to(self.upload_to.clone())
            .max_length(self.max_length)
            .allow_empty_file(self.allow_empty_file)
            .encoding(self.encoding)
            .missing_name(self.missing_name)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
