//! Table materialization.
//!
//! Turns the dictionary and packed-index slices of a catalog table's
//! columns into row values. Failures stay local to their column: the
//! column reads as nulls, a warning is attached, and sibling columns still
//! decode.

use semlens_common::constants::DEFAULT_MAX_ROWS;
use semlens_common::{
    CellValue, DataType, ErrorCode, LensError, LensResult, Warning, WarningScope,
};
use semlens_storage::DirectoryContainer;
use serde::Serialize;
use tracing::{debug, warn};

use super::dictionary::{ColumnDictionary, DecodeSettings};
use super::packed::PackedIndexArray;
use crate::catalog::{CatalogColumn, CatalogTable, ColumnKind};

static NULL_CELL: CellValue = CellValue::Null;

/// One column of a materialized table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedColumn {
    /// Column name.
    pub name: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Data or formula column.
    pub kind: ColumnKind,
    /// Row values; `None` for formula columns, which have none stored.
    pub values: Option<Vec<CellValue>>,
}

impl MaterializedColumn {
    /// Returns the value of a row, or `None` for formula columns and rows
    /// past the end.
    pub fn value(&self, row: usize) -> Option<&CellValue> {
        self.values.as_ref()?.get(row)
    }
}

/// A table with its row values decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedTable {
    /// Table name.
    pub name: String,
    /// Columns in catalog order.
    pub columns: Vec<MaterializedColumn>,
    /// Number of rows every data column holds.
    pub row_count: usize,
    /// Contained failures of this table and its columns.
    pub warnings: Vec<Warning>,
}

impl MaterializedTable {
    /// Finds a column by name.
    pub fn column(&self, name: &str) -> Option<&MaterializedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns one row across all columns. Formula columns read as null.
    pub fn row(&self, row: usize) -> Option<Vec<&CellValue>> {
        if row >= self.row_count {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| c.value(row).unwrap_or(&NULL_CELL))
                .collect(),
        )
    }

    /// Iterates rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&CellValue>> + '_ {
        (0..self.row_count).filter_map(move |row| self.row(row))
    }

    /// Returns true if any warning is attached.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Outcome of one column before the row count is settled.
enum ColumnOutcome {
    Formula,
    Decoded(Vec<CellValue>),
    Failed,
}

/// Decodes catalog tables against a directory container.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    container: &'a DirectoryContainer,
    settings: DecodeSettings,
    max_rows: usize,
}

impl<'a> Materializer<'a> {
    /// Creates a materializer reading slices from `container`.
    pub fn new(container: &'a DirectoryContainer, settings: DecodeSettings) -> Self {
        Self {
            container,
            settings,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Caps the row count taken from catalog statistics.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Materializes every column of a table.
    ///
    /// Never fails as a whole: column failures are attached as warnings.
    pub fn materialize(&self, table: &CatalogTable) -> MaterializedTable {
        let mut warnings = Vec::new();

        let outcomes: Vec<ColumnOutcome> = table
            .columns
            .iter()
            .map(|column| {
                if column.kind.is_formula() {
                    return ColumnOutcome::Formula;
                }
                match self.decode_column(table, column) {
                    Ok(values) => ColumnOutcome::Decoded(values),
                    Err(e) => {
                        warn!(
                            table = %table.name,
                            column = %column.name,
                            error = %e,
                            "column not decoded"
                        );
                        warnings.push(Warning::from_error(column_scope(table, column), &e));
                        ColumnOutcome::Failed
                    }
                }
            })
            .collect();

        let decoded_min = outcomes
            .iter()
            .filter_map(|o| match o {
                ColumnOutcome::Decoded(values) => Some(values.len()),
                _ => None,
            })
            .min();
        let row_count = match decoded_min {
            Some(count) => count,
            None => self.statistic_row_count(table, &mut warnings),
        };

        let columns = table
            .columns
            .iter()
            .zip(outcomes)
            .map(|(column, outcome)| {
                let values = match outcome {
                    ColumnOutcome::Formula => None,
                    ColumnOutcome::Decoded(mut values) => {
                        if values.len() > row_count {
                            let message = format!(
                                "column holds {} rows, table has {row_count}; extra rows dropped",
                                values.len()
                            );
                            warn!(table = %table.name, column = %column.name, "{message}");
                            warnings.push(Warning::new(
                                column_scope(table, column),
                                ErrorCode::PackedIndexDecode,
                                message,
                            ));
                            values.truncate(row_count);
                        }
                        Some(values)
                    }
                    ColumnOutcome::Failed => Some(vec![CellValue::Null; row_count]),
                };
                MaterializedColumn {
                    name: column.name.clone(),
                    data_type: column.data_type,
                    kind: column.kind,
                    values,
                }
            })
            .collect();

        debug!(
            table = %table.name,
            rows = row_count,
            warnings = warnings.len(),
            "materialized table"
        );

        MaterializedTable {
            name: table.name.clone(),
            columns,
            row_count,
            warnings,
        }
    }

    /// Row count for a table none of whose columns decoded. The statistic
    /// is untrusted, so counts above the limit become zero.
    fn statistic_row_count(&self, table: &CatalogTable, warnings: &mut Vec<Warning>) -> usize {
        let Some(count) = table
            .row_count_statistic()
            .and_then(|n| usize::try_from(n).ok())
        else {
            return 0;
        };
        if count <= self.max_rows {
            return count;
        }

        let message = format!(
            "row count statistic {count} exceeds the limit of {} rows; table left empty",
            self.max_rows
        );
        warn!(table = %table.name, "{message}");
        warnings.push(Warning::new(
            WarningScope::Table {
                table: table.name.clone(),
            },
            ErrorCode::CatalogConsistency,
            message,
        ));
        0
    }

    fn decode_column(
        &self,
        table: &CatalogTable,
        column: &CatalogColumn,
    ) -> LensResult<Vec<CellValue>> {
        let entity = format!("{}.{}", table.name, column.name);
        if !column.issues.is_empty() {
            return Err(LensError::catalog(entity, column.issues.join("; ")));
        }
        let dictionary_ref = column
            .dictionary
            .as_ref()
            .ok_or_else(|| LensError::catalog(&entity, "column has no dictionary"))?;
        if column.partitions.is_empty() {
            return Err(LensError::catalog(&entity, "column has no index segments"));
        }

        let dictionary_name = &dictionary_ref.file.file_name;
        let dictionary_bytes = self.container.slice(dictionary_name).ok_or_else(|| {
            LensError::catalog(
                &entity,
                format!("dictionary slice '{dictionary_name}' is not in the container"),
            )
        })?;
        let dictionary = ColumnDictionary::decode(
            dictionary_name,
            &dictionary_bytes,
            column.data_type,
            &self.settings,
        )?;

        let mut values = Vec::new();
        for segment in &column.partitions {
            let segment_name = &segment.file.file_name;
            let bytes = self.container.slice(segment_name).ok_or_else(|| {
                LensError::catalog(
                    &entity,
                    format!("index slice '{segment_name}' is not in the container"),
                )
            })?;
            let indices = PackedIndexArray::parse(segment_name, bytes)?;
            values.reserve(indices.len());
            for (row, index) in indices.iter().enumerate() {
                let value = dictionary.get(index).ok_or_else(|| {
                    LensError::packed_index(
                        segment_name,
                        format!(
                            "row {row}: index {index} beyond dictionary of {} positions",
                            dictionary.len()
                        ),
                    )
                })?;
                values.push(value.clone());
            }
        }
        Ok(values)
    }
}

fn column_scope(table: &CatalogTable, column: &CatalogColumn) -> WarningScope {
    WarningScope::Column {
        table: table.name.clone(),
        column: column.name.clone(),
    }
}
