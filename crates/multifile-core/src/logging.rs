//! Structured logging field name constants for multifile.
//!
//! All crates use these constants for structured `tracing` fields so that
//! commit, open and delete events can be queried by the same names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Backend failure or over-long stored value that aborts a save |
//! | WARN  | Handle dropped from the stored string |
//! | INFO  | Per-save summaries |
//! | DEBUG | Per-file commit, open and delete decisions |
//! | TRACE | Codec tokens |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within the subsystem.
/// Examples: "commit", "filesystem", "record_store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "commit", "delete", "open", "pre_save", "load"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Model (table) name of the owning record.
pub const MODEL: &str = "model";

/// UUID of the owning record.
pub const RECORD_ID: &str = "record_id";

/// Name of the file-list field.
pub const FIELD: &str = "field";

/// Storage name of a single file.
pub const FILE_NAME: &str = "file_name";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of files involved in an operation.
pub const FILE_COUNT: &str = "file_count";

/// Byte size of a file.
pub const SIZE_BYTES: &str = "size_bytes";

/// Character length of an encoded stored string.
pub const ENCODED_LEN: &str = "encoded_len";

/// Wall-clock duration of an operation in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Configured maximum column length.
pub const MAX_LENGTH: &str = "max_length";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Number of handles left out of a stored string.
pub const OMITTED_COUNT: &str = "omitted_count";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique() {
        let names = [
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            MODEL,
            RECORD_ID,
            FIELD,
            FILE_NAME,
            FILE_COUNT,
            SIZE_BYTES,
            ENCODED_LEN,
            DURATION_MS,
            MAX_LENGTH,
            ERROR_MSG,
            OMITTED_COUNT,
        ];
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_field_names_are_snake_case() {
        for name in [FILE_NAME, RECORD_ID, ENCODED_LEN, DURATION_MS] {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
