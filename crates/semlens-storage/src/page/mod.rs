//! Catalog database page format.
//!
//! The catalog slice is a paged B-tree database. Each table is a tree of
//! pages keyed by rowid:
//!
//! - **Interior table pages**: child pointers and separator rowids
//! - **Leaf table pages**: the rows themselves, as cells
//! - **Overflow pages**: continuation of payloads too large for their leaf
//!
//! # Page Format
//!
//! ```text
//! +---------------------+
//! | DB header (page 1)  |  100 bytes, page 1 only
//! +---------------------+
//! | B-tree page header  |  8 bytes (leaf) or 12 bytes (interior)
//! +---------------------+
//! | Cell pointer array  |  2 bytes per cell, BE
//! +---------------------+
//! |     Free space      |
//! +---------------------+
//! |    Cell content     |  grows from the end of the usable area
//! +---------------------+
//! |   Reserved bytes    |
//! +---------------------+
//! ```
//!
//! All multi-byte integers in this format are big-endian.

mod btree;
mod cell;
mod header;
mod record;
mod types;
mod varint;

pub use btree::{PageEngine, RowRejection, TableScan};
pub use cell::{local_payload_size, max_local, min_local, InteriorCell, LeafCell};
pub use header::{DbHeader, PageRef, TextEncoding};
pub use record::{decode_record, serial_body_size, CatalogRow, Field, RecordValue};
pub use types::PageType;
pub use varint::{decode_varint, encode_varint, varint_len};
