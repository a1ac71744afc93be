//! Pre-save commit of pending uploads.
//!
//! Runs right before a record is written: every pending handle is saved to
//! the backend, then the surviving names are encoded into the value that
//! goes into the column. State lives in a [`CommitBatch`] owned by a single
//! call, so concurrent saves of different records never share it.

use chrono::{DateTime, Local};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::field::{FileListField, MissingNamePolicy};
use crate::handle::FileHandle;
use crate::record::RecordKey;
use crate::value::FieldValue;

/// Bookkeeping for one pre-save call.
#[derive(Debug, Default)]
pub struct CommitBatch {
    committed: Vec<String>,
    names: Vec<String>,
    omitted: usize,
}

impl CommitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn committed(&mut self, name: &str) {
        self.committed.push(name.to_string());
    }

    fn keep(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    fn omit(&mut self) {
        self.omitted += 1;
    }

    fn finish(self, stored: String) -> CommitOutcome {
        CommitOutcome {
            stored,
            committed: self.committed,
            omitted: self.omitted,
        }
    }
}

/// Result of a pre-save call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Encoded value to write to the column.
    pub stored: String,
    /// Names committed to the backend by this call, in list order.
    pub committed: Vec<String>,
    /// Handles left out because they had no name.
    pub omitted: usize,
}

/// Commits pending handles of one field and produces its stored string.
#[derive(Debug, Clone)]
pub struct CommitCoordinator<'a> {
    field: &'a FileListField,
    now: Option<DateTime<Local>>,
}

impl<'a> CommitCoordinator<'a> {
    pub fn new(field: &'a FileListField) -> Self {
        Self { field, now: None }
    }

    /// Use a fixed timestamp for upload directories.
    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = Some(now);
        self
    }

    /// Commit every pending handle in `value` and return the value to store.
    ///
    /// Leaves `value` decoded with only the handles that made it into the
    /// stored string. The record itself is not written. Fails with
    /// [`Error::ValueTooLong`] when the encoded value exceeds the field's
    /// `max_length`; files committed by this call stay committed.
    #[instrument(skip(self, value), fields(
        subsystem = "core",
        component = "commit",
        op = "pre_save",
        model = %record.model,
        record_id = %record.id,
        field = %self.field.name(),
    ))]
    pub async fn pre_save(&self, record: &RecordKey, value: &mut FieldValue) -> Result<CommitOutcome> {
        let start = Instant::now();
        let now = self.now.unwrap_or_else(Local::now);
        let field = self.field;
        let mut batch = CommitBatch::new();

        let handles = field.accessor().read(Some(record), value);
        for (index, handle) in handles.iter_mut().enumerate() {
            if handle.is_deleted() {
                debug!(index, "Skipping deleted file");
                continue;
            }
            if !handle.is_committed() && handle.is_pending() {
                self.commit_one(record, handle, &now).await?;
                if let Some(name) = handle.name() {
                    batch.committed(name);
                }
            }
            match handle.name().filter(|n| !n.is_empty()) {
                Some(name) => batch.keep(name),
                None => match field.missing_name_policy() {
                    MissingNamePolicy::Omit => {
                        warn!(index, "File has no name, leaving it out of the stored value");
                        batch.omit();
                    }
                    MissingNamePolicy::Fail => {
                        return Err(Error::MissingName {
                            field: field.name().to_string(),
                            index,
                        });
                    }
                },
            }
        }
        handles.retain(|h| h.is_bound() && !h.is_deleted());

        let stored = field.codec().encode(&batch.names);
        let encoded_len = stored.chars().count();
        if encoded_len > field.get_max_length() {
            error!(
                encoded_len,
                max_length = field.get_max_length(),
                "Stored value exceeds the column length"
            );
            return Err(Error::ValueTooLong {
                field: field.name().to_string(),
                length: encoded_len,
                max_length: field.get_max_length(),
            });
        }

        let outcome = batch.finish(stored);
        info!(
            file_count = handles.len(),
            committed_count = outcome.committed.len(),
            omitted_count = outcome.omitted,
            encoded_len,
            duration_ms = start.elapsed().as_millis() as u64,
            "File list prepared for save"
        );
        Ok(outcome)
    }

    async fn commit_one(
        &self,
        record: &RecordKey,
        handle: &mut FileHandle,
        now: &DateTime<Local>,
    ) -> Result<()> {
        let Some(upload) = handle.upload() else {
            return Ok(());
        };
        let target = if upload.preserve_name {
            upload.name.clone()
        } else {
            self.field.generate_filename(Some(record), &upload.name, now)?
        };
        let max_length = Some(self.field.get_max_length());
        if let Err(e) = handle.commit_pending(&target, max_length).await {
            error!(file_name = %target, error = %e, "Commit to storage failed");
            return Err(e);
        }
        Ok(())
    }
}
