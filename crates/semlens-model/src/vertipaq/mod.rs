//! Columnar value decoding.
//!
//! Imported columns are stored as a dictionary of distinct values plus one
//! or more bit-packed arrays of dictionary positions, one per partition
//! segment:
//!
//! ```text
//!   dictionary slice        packed index slices (ascending segment order)
//!  ┌───────────────┐       ┌──────────────┐ ┌──────────────┐
//!  │ 0: <blank>    │◄──────┤ 1 0 2 1 ...  │ │ 2 2 0 ...    │
//!  │ 1: "Alice"    │       └──────────────┘ └──────────────┘
//!  │ 2: "Bob"      │
//!  └───────────────┘
//! ```
//!
//! [`Materializer`] joins the two per column and settles the table's row
//! count.

mod dictionary;
mod materializer;
mod packed;

pub use dictionary::{ColumnDictionary, DecodeSettings};
pub use materializer::{MaterializedColumn, MaterializedTable, Materializer};
pub use packed::{bit_width_for, encode_packed, PackedIndexArray};
