//! # semlens-test
//!
//! Integration tests for SemLens.
//!
//! This crate contains:
//! - Byte-exact builders for every input format the loader reads
//! - A model fixture that assembles complete packages from table values
//! - End-to-end and property tests under `tests/`

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Catalog database builder
pub mod catalog_db;

/// Columnar slice encoders
pub mod columnar;

/// Directory container builder
pub mod container;

/// Complete model fixtures
pub mod fixture;

/// Package archives and a test block codec
pub mod package;

pub use catalog_db::{encode_record, CatalogDbBuilder, SqlValue};
pub use columnar::{encode_dictionary, pack_indices, DictionaryLayout};
pub use container::ContainerBuilder;
pub use fixture::{FixtureColumn, FixtureTable, ModelFixture};
pub use package::{zip_package, FramedCodec};
