//! System-wide constants for SemLens.
//!
//! Format signatures, well-known entry and slice names, and decoding limits
//! shared across the pipeline.

// =============================================================================
// Archive and Container Constants
// =============================================================================

/// Name of the archive entry holding the compressed model blob.
pub const DEFAULT_DATA_MODEL_ENTRY: &str = "DataModel";

/// Name of the directory slice holding the catalog database.
pub const DEFAULT_CATALOG_SLICE: &str = "metadata.sqlitedb";

/// Signature text at the start of a decompressed directory container.
///
/// Stored as UTF-16LE, so it occupies [`CONTAINER_SIGNATURE_SIZE`] bytes.
pub const CONTAINER_SIGNATURE: &str = "STREAM_STORAGE_SIGNATURE_)!@#$%^&*(";

/// Size in bytes of the encoded container signature.
pub const CONTAINER_SIGNATURE_SIZE: usize = 70;

/// Supported directory container version.
pub const CONTAINER_VERSION: u32 = 1;

// =============================================================================
// Catalog Database Constants
// =============================================================================

/// Magic string at the start of the catalog database slice.
pub const CATALOG_DB_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Size of the database preamble carried by page 1.
pub const CATALOG_DB_HEADER_SIZE: usize = 100;

/// Page size used when the header field is unset.
pub const DEFAULT_CATALOG_PAGE_SIZE: usize = 64 * 1024;

/// Smallest page size the catalog database format allows.
pub const MIN_CATALOG_PAGE_SIZE: usize = 512;

/// Smallest usable page area (page size minus reserved bytes).
pub const MIN_USABLE_PAGE_SIZE: usize = 480;

/// Maximum length of an encoded varint.
pub const MAX_VARINT_LEN: usize = 9;

// =============================================================================
// Columnar Storage Constants
// =============================================================================

/// Size of the fixed dictionary slice header.
pub const DICTIONARY_HEADER_SIZE: usize = 8;

/// Size of the fixed packed-index slice header.
pub const PACKED_INDEX_HEADER_SIZE: usize = 8;

/// Largest supported packed-index bit width.
pub const MAX_INDEX_BIT_WIDTH: u8 = 32;

/// Default fixed-point scale of decimal dictionary entries.
pub const DEFAULT_DECIMAL_SCALE: u32 = 4;

/// Default date/time epoch (OLE automation base date).
pub const DEFAULT_DATETIME_EPOCH: &str = "1899-12-30T00:00:00";

/// Default date/time tick resolution (100 ns ticks).
pub const DEFAULT_TICKS_PER_SECOND: u64 = 10_000_000;

// =============================================================================
// Limits
// =============================================================================

/// Default upper bound for a decompressed model blob (4 GB).
pub const DEFAULT_MAX_BLOB_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Default upper bound for rows taken from a catalog row-count statistic.
pub const DEFAULT_MAX_ROWS: usize = 50_000_000;

/// Default preview row limit for inspection front-ends.
pub const DEFAULT_PREVIEW_ROWS: usize = 100;
