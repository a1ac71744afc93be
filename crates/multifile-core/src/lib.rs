//! # multifile-core
//!
//! Multi-file list fields for record-oriented storage.
//!
//! A single text column holds an ordered list of file names. This crate
//! provides the codec for that column, the per-file handles, the accessor
//! that turns a record's raw value into handles, and the coordinator that
//! commits pending uploads right before the record is written.

pub mod codec;
pub mod commit;
pub mod config;
pub mod defaults;
pub mod error;
pub mod field;
pub mod form;
pub mod handle;
pub mod logging;
pub mod memory;
pub mod model;
pub mod record;
pub mod storage;
pub mod upload;
pub mod value;
pub mod widget;

// Re-export commonly used types at crate root
pub use codec::{ListEncoding, StringListCodec};
pub use commit::{CommitBatch, CommitCoordinator, CommitOutcome};
pub use config::{ConfigError, ConfigResult, MultifileConfig};
pub use error::{Error, Result};
pub use field::{CheckMessage, FieldDescriptor, FileListField, MissingNamePolicy, UploadTo};
pub use form::{MultipleFileFormField, ValidationError, ValidationErrors};
pub use handle::FileHandle;
pub use memory::{MemoryRecordStore, MemoryStorage};
pub use model::{FileModel, SaveReport};
pub use record::{Record, RecordKey, RecordStore};
pub use storage::{FileStream, StorageBackend};
pub use upload::{Upload, UploadLike, UploadedFiles};
pub use value::{FieldValue, FileListAccessor, ListEntry};
pub use widget::MultipleFileInput;
