//! # multifile-db
//!
//! Concrete adapters for multifile fields:
//! - Filesystem storage backend with no-clobber writes
//! - PostgreSQL record store for the text columns
//! - Connection pool management
//!
//! ## Example
//!
//! ```rust,ignore
//! use multifile_core::{FileListField, FileModel, Upload};
//! use multifile_db::{create_pool, FilesystemStorage, PgRecordStore};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FilesystemStorage::new("./media", "/media/"));
//! let model = FileModel::new("document")
//!     .with_field(FileListField::new("files", storage).upload_to("docs/%Y/%m"));
//! let store = PgRecordStore::new(create_pool("postgres://localhost/app").await?);
//!
//! let mut record = model.new_record(uuid::Uuid::now_v7());
//! record.set("files", vec![Upload::new("report.pdf", bytes)]);
//! let report = model.save(&store, &mut record).await?;
//! ```

pub mod filesystem;
pub mod pg;
pub mod pool;

pub use filesystem::FilesystemStorage;
pub use pg::{quote_identifier, PgRecordStore};
pub use pool::create_pool;
