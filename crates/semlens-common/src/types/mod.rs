//! Core types for SemLens.
//!
//! This module contains the catalog identifier newtypes, the declared
//! column data types, and the materialized cell values.

mod ids;
mod value;

pub use ids::{
    ColumnId, ColumnStorageId, DictionaryId, HierarchyId, HierarchyStorageId, MeasureId,
    PartitionId, PartitionStorageId, RelationshipId, StorageFileId, TableId,
};
pub use value::{CellValue, DataType, Decimal};
