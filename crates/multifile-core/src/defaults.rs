//! Centralized default constants for multifile.
//!
//! Every crate and the CLI reference these constants instead of defining
//! their own magic values.

// =============================================================================
// COLUMN
// =============================================================================

/// Maximum characters of the encoded stored string.
pub const MAX_LENGTH: usize = 100;

/// Separator between names in the legacy stored string.
pub const LIST_SEPARATOR: &str = ", ";

// =============================================================================
// UPLOADS
// =============================================================================

/// Default upload directory pattern (strftime, relative to the media root).
pub const UPLOAD_TO: &str = "";

/// Whether zero-byte uploads are accepted by form validation.
pub const ALLOW_EMPTY_FILE: bool = false;

/// Name used when a sanitized upload name ends up empty.
pub const FALLBACK_FILE_NAME: &str = "file";

// =============================================================================
// STORAGE
// =============================================================================

/// Default media root for the filesystem backend.
pub const MEDIA_ROOT: &str = "./media";

/// Default public URL prefix for stored files.
pub const MEDIA_URL: &str = "/media/";

// =============================================================================
// WIDGET
// =============================================================================

/// Tip rendered next to the multi-file input.
pub const MULTIPLE_TIP: &str = "Multiple files possible";
