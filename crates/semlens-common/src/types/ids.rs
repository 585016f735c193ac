//! Catalog identifier types.
//!
//! Every catalog entity is keyed by an integer surrogate id that is only
//! unique within its own catalog table. These newtypes keep a column id
//! from being used where a storage-file id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new id from a raw catalog value.
            #[inline]
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw catalog value.
            #[inline]
            #[must_use]
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            #[inline]
            fn from(id: i64) -> Self {
                Self::new(id)
            }
        }

        impl From<$name> for i64 {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

catalog_id!(
    /// Identifier of a row in the `Table` catalog table.
    TableId
);
catalog_id!(
    /// Identifier of a row in the `Column` catalog table.
    ColumnId
);
catalog_id!(
    /// Identifier of a row in the `ColumnStorage` catalog table.
    ColumnStorageId
);
catalog_id!(
    /// Identifier of a row in the `ColumnPartitionStorage` catalog table.
    PartitionStorageId
);
catalog_id!(
    /// Identifier of a row in the `Partition` catalog table.
    PartitionId
);
catalog_id!(
    /// Identifier of a row in the `DictionaryStorage` catalog table.
    DictionaryId
);
catalog_id!(
    /// Identifier of a row in the `StorageFile` catalog table.
    StorageFileId
);
catalog_id!(
    /// Identifier of a row in the `AttributeHierarchy` catalog table.
    HierarchyId
);
catalog_id!(
    /// Identifier of a row in the `AttributeHierarchyStorage` catalog table.
    HierarchyStorageId
);
catalog_id!(
    /// Identifier of a row in the `Measure` catalog table.
    MeasureId
);
catalog_id!(
    /// Identifier of a row in the `Relationship` catalog table.
    RelationshipId
);
