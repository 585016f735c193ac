//! # semlens-model
//!
//! Model package loading for SemLens.
//!
//! This crate turns a model package into a [`DataModel`]:
//! - **archive** / **decompress**: the compressed `DataModel` entry and the
//!   external block codec that unpacks it
//! - **catalog**: catalog database rows projected into tables, columns,
//!   measures, and relationships
//! - **vertipaq**: dictionary and bit-packed index decoding into row values
//! - **filter**: removal of engine-internal objects
//! - **profile**: per-column counts over decoded tables
//! - **loader** / **model** / **session**: the pipeline, the loaded model
//!   with its lazy table cache, and replacement of one model by the next
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use semlens_common::LensConfig;
//! use semlens_model::{ExternalCommand, ModelLoader};
//!
//! # async fn example() -> semlens_common::LensResult<()> {
//! let codec = ExternalCommand::new("xpress9-decompress");
//! let loader = ModelLoader::new(LensConfig::default(), Arc::new(codec))?;
//! let model = loader.load_path(Path::new("report.pbix")).await?;
//! for name in model.table_names() {
//!     let table = model.table(&name)?;
//!     println!("{name}: {} rows", table.row_count);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Package archive access
pub mod archive;

/// Catalog projection
pub mod catalog;

/// Block decompression
pub mod decompress;

/// System-object filtering
pub mod filter;

/// Package loading pipeline
pub mod loader;

/// The loaded model
pub mod model;

/// Column statistics
pub mod profile;

/// Model replacement
pub mod session;

/// Columnar value decoding
pub mod vertipaq;

pub use archive::ArchiveReader;
pub use catalog::{CatalogGraph, ModelSchema};
pub use decompress::{BlockDecompressor, ExternalCommand, Passthrough};
pub use filter::{filter_names, is_system_object};
pub use loader::ModelLoader;
pub use model::DataModel;
pub use profile::{profile, ColumnStats, TableProfile};
pub use session::Session;
pub use vertipaq::{MaterializedColumn, MaterializedTable};
