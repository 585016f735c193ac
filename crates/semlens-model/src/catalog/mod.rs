//! Model catalog.
//!
//! The catalog database inside the container describes every object of the
//! model. This module turns its raw rows into typed structures:
//!
//! - **ddl**: column layouts from `CREATE TABLE` statements
//! - **rows**: named access to catalog rows
//! - **projector**: joins catalog tables into a [`CatalogGraph`]
//! - **schema**: the graph types and the serializable [`ModelSchema`]

mod ddl;
mod projector;
mod rows;
mod schema;

pub use ddl::{parse_create_table, TableLayout};
pub use projector::{project, Projection, OPTIONAL_TABLES, REQUIRED_TABLES};
pub use rows::{CatalogReader, CatalogTableRows, RowView, SCHEMA_TABLE};
pub use schema::{
    CatalogColumn, CatalogDictionaryRef, CatalogGraph, CatalogPartition, CatalogStorageRef,
    CatalogTable, Cardinality, ColumnKind, CrossFilter, Measure, ModelSchema, Partition,
    Relationship, SchemaColumn, SchemaTable,
};
