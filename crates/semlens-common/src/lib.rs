//! # semlens-common
//!
//! Common types, errors, and configuration for SemLens.
//!
//! This crate provides the foundational types shared by every stage of the
//! model decoding pipeline. It includes:
//!
//! - **Types**: Catalog surrogate identifiers (`TableId`, `ColumnId`, ...), the
//!   declared column `DataType`, and materialized `CellValue`s
//! - **Errors**: Unified error handling with `LensError` and contained `Warning`s
//! - **Config**: Loader and decoder configuration structures
//! - **Constants**: Format signatures, default entry names, and limits
//!
//! ## Example
//!
//! ```rust
//! use semlens_common::types::{CellValue, DataType, TableId};
//! use semlens_common::error::LensResult;
//!
//! fn example() -> LensResult<()> {
//!     let table = TableId::new(7);
//!     let value = CellValue::Text("Alice".to_string());
//!     assert_eq!(table.as_i64(), 7);
//!     assert!(value.matches_type(DataType::String));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::LensConfig;
pub use error::{ErrorCode, LensError, LensResult, Warning, WarningScope};
pub use types::{CellValue, DataType};
