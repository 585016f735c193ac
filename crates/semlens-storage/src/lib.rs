//! # semlens-storage
//!
//! Byte-level storage formats for SemLens.
//!
//! This crate reads the two self-describing formats found inside a
//! decompressed model blob:
//! - The directory container: a signed table of named byte ranges
//! - The embedded catalog database: a paged B-tree file whose table trees
//!   hold the model's metadata rows
//!
//! Everything here is read-only and works over a single immutable
//! [`bytes::Bytes`] buffer; slices handed out are zero-copy views.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Bounds-checked byte access
pub mod reader;

/// Directory container parsing
pub mod container;

/// Catalog database pages, records, and table traversal
pub mod page;

pub use container::{DirectoryContainer, RawSlice};
pub use page::{CatalogRow, Field, PageEngine, RecordValue, RowRejection, TableScan};
