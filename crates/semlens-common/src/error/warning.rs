//! Contained, non-fatal conditions.
//!
//! A `Warning` records an error that was contained at row, column, or
//! table scope so front-ends can flag partial data.

use std::fmt;

use serde::Serialize;

use super::lens::{ErrorCode, LensError};

/// The entity a warning is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningScope {
    /// The load as a whole.
    Load,
    /// A single row of a catalog table.
    CatalogRow {
        /// Catalog table name.
        table: String,
        /// Row id of the rejected row.
        rowid: i64,
    },
    /// A model table.
    Table {
        /// Table name.
        table: String,
    },
    /// A column of a model table.
    Column {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl WarningScope {
    /// Returns the model or catalog table the scope names, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Load => None,
            Self::CatalogRow { table, .. } | Self::Table { table } | Self::Column { table, .. } => {
                Some(table)
            }
        }
    }
}

impl fmt::Display for WarningScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::CatalogRow { table, rowid } => write!(f, "catalog {table} row {rowid}"),
            Self::Table { table } => write!(f, "table '{table}'"),
            Self::Column { table, column } => write!(f, "column '{table}'[{column}]"),
        }
    }
}

/// A contained error attached to the entity it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// What the warning is attached to.
    pub scope: WarningScope,
    /// Error code of the contained condition.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl Warning {
    /// Creates a warning with an explicit code.
    #[must_use]
    pub fn new(scope: WarningScope, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            scope,
            code,
            message: message.into(),
        }
    }

    /// Records a contained error against `scope`.
    #[must_use]
    pub fn from_error(scope: WarningScope, error: &LensError) -> Self {
        Self::new(scope, error.code(), error.to_string())
    }

    /// Returns true if the warning is attached to the given column.
    #[must_use]
    pub fn is_for_column(&self, table: &str, column: &str) -> bool {
        matches!(
            &self.scope,
            WarningScope::Column { table: t, column: c } if t == table && c == column
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.scope, self.code, self.message)
    }
}
