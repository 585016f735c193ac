//! Pipeline error types.
//!
//! Provides the error taxonomy for every decoding stage, from archive
//! extraction down to packed-index decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid configuration.
    InvalidConfig = 0x0002,
    /// General I/O error.
    Io = 0x0003,

    // Package errors (0x0100 - 0x01FF)
    /// Archive entry missing or archive corrupt.
    Archive = 0x0100,
    /// Block codec rejected its input.
    Decompression = 0x0101,

    // Container errors (0x0200 - 0x02FF)
    /// Container signature mismatch.
    BadMagic = 0x0200,
    /// Directory framing or slice bounds are invalid.
    MalformedDirectory = 0x0201,

    // Catalog errors (0x0300 - 0x03FF)
    /// Catalog database page could not be traversed.
    PageFormat = 0x0300,
    /// A single catalog record could not be decoded.
    RecordDecode = 0x0301,
    /// A catalog reference could not be resolved.
    CatalogConsistency = 0x0302,

    // Columnar errors (0x0400 - 0x04FF)
    /// A column dictionary could not be decoded.
    DictionaryDecode = 0x0400,
    /// A packed index segment could not be decoded.
    PackedIndexDecode = 0x0401,

    // Model errors (0x0500 - 0x05FF)
    /// Requested table does not exist.
    TableNotFound = 0x0500,
    /// The load was replaced by a newer one.
    Superseded = 0x0501,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Package",
            0x02 => "Container",
            0x03 => "Catalog",
            0x04 => "Columnar",
            0x05 => "Model",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for SemLens.
///
/// Variants above the catalog row level are fatal to a load; the
/// row-, column- and dictionary-scoped variants are normally contained
/// and turned into [`Warning`](super::Warning)s by the stage that hits them.
///
/// # Example
///
/// ```rust
/// use semlens_common::error::{LensError, LensResult};
///
/// fn lookup(name: &str) -> LensResult<()> {
///     Err(LensError::TableNotFound { table: name.to_string() })
/// }
/// assert!(lookup("Sales").is_err());
/// ```
#[derive(Debug, Error)]
pub enum LensError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Package Errors
    // ==========================================================================
    /// Archive could not be opened or the entry is missing.
    #[error("archive error: {message}")]
    Archive {
        /// Error message.
        message: String,
    },

    /// The block codec rejected the compressed model blob.
    #[error("corrupt compressed stream: {message}")]
    Decompression {
        /// Codec-provided detail.
        message: String,
    },

    // ==========================================================================
    // Container Errors
    // ==========================================================================
    /// Container signature does not match.
    #[error("bad container signature: {reason}")]
    BadMagic {
        /// What was found instead.
        reason: String,
    },

    /// Directory framing or slice bounds are invalid.
    #[error("malformed directory: {reason}")]
    MalformedDirectory {
        /// Description of the problem.
        reason: String,
    },

    // ==========================================================================
    // Catalog Errors
    // ==========================================================================
    /// A catalog page could not be read or traversed.
    #[error("catalog page {page}: {reason}")]
    PageFormat {
        /// Page number (1-indexed, 0 for the database header).
        page: u32,
        /// Description of the problem.
        reason: String,
    },

    /// A catalog record could not be decoded.
    #[error("catalog row {rowid}: {reason}")]
    RecordDecode {
        /// Row id of the rejected row.
        rowid: i64,
        /// Description of the problem.
        reason: String,
    },

    /// A catalog reference could not be resolved.
    #[error("catalog consistency ({entity}): {reason}")]
    CatalogConsistency {
        /// The entity holding the dangling reference.
        entity: String,
        /// Description of the problem.
        reason: String,
    },

    // ==========================================================================
    // Columnar Errors
    // ==========================================================================
    /// A dictionary slice could not be decoded.
    #[error("dictionary '{slice}': {reason}")]
    DictionaryDecode {
        /// Slice name.
        slice: String,
        /// Description of the problem.
        reason: String,
    },

    /// A packed index slice could not be decoded.
    #[error("packed index '{slice}': {reason}")]
    PackedIndexDecode {
        /// Slice name.
        slice: String,
        /// Description of the problem.
        reason: String,
    },

    // ==========================================================================
    // Model Errors
    // ==========================================================================
    /// Table not found in the model.
    #[error("table '{table}' not found")]
    TableNotFound {
        /// The missing table.
        table: String,
    },

    /// The load was replaced by a newer one before it completed.
    #[error("load generation {generation} was superseded")]
    Superseded {
        /// Generation of the discarded load.
        generation: u64,
    },
}

impl LensError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::Archive { .. } => ErrorCode::Archive,
            Self::Decompression { .. } => ErrorCode::Decompression,
            Self::BadMagic { .. } => ErrorCode::BadMagic,
            Self::MalformedDirectory { .. } => ErrorCode::MalformedDirectory,
            Self::PageFormat { .. } => ErrorCode::PageFormat,
            Self::RecordDecode { .. } => ErrorCode::RecordDecode,
            Self::CatalogConsistency { .. } => ErrorCode::CatalogConsistency,
            Self::DictionaryDecode { .. } => ErrorCode::DictionaryDecode,
            Self::PackedIndexDecode { .. } => ErrorCode::PackedIndexDecode,
            Self::TableNotFound { .. } => ErrorCode::TableNotFound,
            Self::Superseded { .. } => ErrorCode::Superseded,
        }
    }

    /// Returns true if this error rejects the whole file.
    ///
    /// Row-, column- and dictionary-scoped errors are contained by the
    /// stage that produces them.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::RecordDecode { .. }
                | Self::CatalogConsistency { .. }
                | Self::DictionaryDecode { .. }
                | Self::PackedIndexDecode { .. }
                | Self::TableNotFound { .. }
        )
    }

    /// Returns true if this error is retryable.
    ///
    /// Decoding is deterministic, so only I/O can succeed on a retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an archive error.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Creates a decompression error.
    #[must_use]
    pub fn decompression(message: impl Into<String>) -> Self {
        Self::Decompression {
            message: message.into(),
        }
    }

    /// Creates a malformed directory error.
    #[must_use]
    pub fn malformed_directory(reason: impl Into<String>) -> Self {
        Self::MalformedDirectory {
            reason: reason.into(),
        }
    }

    /// Creates a page format error.
    #[must_use]
    pub fn page_format(page: u32, reason: impl Into<String>) -> Self {
        Self::PageFormat {
            page,
            reason: reason.into(),
        }
    }

    /// Creates a record decode error.
    #[must_use]
    pub fn record_decode(rowid: i64, reason: impl Into<String>) -> Self {
        Self::RecordDecode {
            rowid,
            reason: reason.into(),
        }
    }

    /// Creates a catalog consistency error.
    #[must_use]
    pub fn catalog(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CatalogConsistency {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Creates a dictionary decode error.
    #[must_use]
    pub fn dictionary(slice: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DictionaryDecode {
            slice: slice.into(),
            reason: reason.into(),
        }
    }

    /// Creates a packed index decode error.
    #[must_use]
    pub fn packed_index(slice: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PackedIndexDecode {
            slice: slice.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
