//! Named access to catalog rows.
//!
//! [`CatalogReader`] indexes the schema table (root page 1) and reads
//! catalog tables by name. Each returned row is viewed through its table's
//! [`TableLayout`] so projection code can ask for `"ExplicitName"` rather
//! than field 2.

use std::collections::HashMap;

use semlens_common::{ErrorCode, LensResult, Warning, WarningScope};
use semlens_storage::{CatalogRow, PageEngine, RecordValue, TableScan};
use tracing::{debug, warn};

use super::ddl::{parse_create_table, TableLayout};

/// Name of the schema table.
pub const SCHEMA_TABLE: &str = "sqlite_master";

/// Root page of the schema table.
const SCHEMA_ROOT_PAGE: u32 = 1;

/// One `table` entry of the schema table.
#[derive(Debug, Clone)]
struct SchemaEntry {
    name: String,
    root_page: u32,
    layout: TableLayout,
}

/// Rows of one catalog table with their layout.
#[derive(Debug, Clone)]
pub struct CatalogTableRows {
    /// Catalog table name.
    pub name: String,
    /// Column layout.
    pub layout: TableLayout,
    /// Decoded rows in rowid order.
    pub rows: Vec<CatalogRow>,
}

impl CatalogTableRows {
    /// Creates a set of rows from a layout.
    pub fn new(name: impl Into<String>, layout: TableLayout, rows: Vec<CatalogRow>) -> Self {
        Self {
            name: name.into(),
            layout,
            rows,
        }
    }

    /// Iterates rows as named views.
    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|row| RowView {
            layout: &self.layout,
            row,
        })
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A catalog row viewed through its table layout.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    layout: &'a TableLayout,
    row: &'a CatalogRow,
}

impl<'a> RowView<'a> {
    /// Returns the row id.
    #[inline]
    pub fn rowid(&self) -> i64 {
        self.row.rowid
    }

    /// Returns the stored value of a column.
    ///
    /// `None` if the table has no such column or the record predates it.
    pub fn value(&self, column: &str) -> Option<&'a RecordValue> {
        let position = self.layout.position(column)?;
        self.row.value(position)
    }

    /// Returns a column as an integer, resolving the rowid alias.
    pub fn int(&self, column: &str) -> Option<i64> {
        let position = self.layout.position(column)?;
        if self.layout.rowid_alias == Some(position) {
            return Some(self.row.rowid);
        }
        self.row.value(position)?.as_i64()
    }

    /// Returns a column as text. Empty text reads as absent.
    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.value(column)?.as_str().filter(|s| !s.is_empty())
    }

    /// Returns a column as a boolean; absent values are false.
    pub fn flag(&self, column: &str) -> bool {
        self.value(column)
            .and_then(RecordValue::as_bool)
            .unwrap_or(false)
    }

    /// Returns the `ID` column, or the rowid if the table has none.
    pub fn id(&self) -> i64 {
        self.int("ID").unwrap_or(self.row.rowid)
    }
}

/// Reads catalog tables by name.
#[derive(Debug)]
pub struct CatalogReader<'e> {
    engine: &'e PageEngine,
    entries: HashMap<String, SchemaEntry>,
    warnings: Vec<Warning>,
}

impl<'e> CatalogReader<'e> {
    /// Reads and indexes the schema table.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the schema table cannot be traversed.
    pub fn open(engine: &'e PageEngine) -> LensResult<Self> {
        let scan = engine.read_table(SCHEMA_ROOT_PAGE)?;
        let mut reader = Self {
            engine,
            entries: HashMap::new(),
            warnings: Vec::new(),
        };
        reader.record_rejections(SCHEMA_TABLE, &scan);

        // type, name, tbl_name, rootpage, sql
        for row in &scan.rows {
            let is_table = row.value(0).and_then(RecordValue::as_str) == Some("table");
            if !is_table {
                continue;
            }
            let (Some(name), Some(root), Some(sql)) = (
                row.value(1).and_then(RecordValue::as_str),
                row.value(3).and_then(RecordValue::as_i64),
                row.value(4).and_then(RecordValue::as_str),
            ) else {
                continue;
            };
            let Ok(root_page) = u32::try_from(root) else {
                reader.warn(
                    WarningScope::CatalogRow {
                        table: SCHEMA_TABLE.to_string(),
                        rowid: row.rowid,
                    },
                    ErrorCode::CatalogConsistency,
                    format!("table '{name}' has invalid root page {root}"),
                );
                continue;
            };
            match parse_create_table(name, sql) {
                Ok(layout) => {
                    reader.entries.insert(
                        name.to_ascii_lowercase(),
                        SchemaEntry {
                            name: name.to_string(),
                            root_page,
                            layout,
                        },
                    );
                }
                Err(e) => reader.warn(
                    WarningScope::CatalogRow {
                        table: SCHEMA_TABLE.to_string(),
                        rowid: row.rowid,
                    },
                    e.code(),
                    e.to_string(),
                ),
            }
        }

        debug!(tables = reader.entries.len(), "indexed catalog schema");
        Ok(reader)
    }

    /// Returns true if the catalog declares the table.
    pub fn has_table(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the declared catalog table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    /// Reads a catalog table, or `None` if the catalog does not declare it.
    ///
    /// Rows that fail to decode are dropped and recorded as warnings.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the table's tree cannot be traversed.
    pub fn read(&mut self, name: &str) -> LensResult<Option<CatalogTableRows>> {
        let Some(entry) = self.entries.get(&name.to_ascii_lowercase()).cloned() else {
            return Ok(None);
        };
        let scan = self.engine.read_table(entry.root_page)?;
        self.record_rejections(&entry.name, &scan);
        Ok(Some(CatalogTableRows {
            name: entry.name,
            layout: entry.layout,
            rows: scan.rows,
        }))
    }

    /// Returns warnings collected so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consumes the reader, returning its warnings.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    fn record_rejections(&mut self, table: &str, scan: &TableScan) {
        for rejection in &scan.rejected {
            self.warn(
                WarningScope::CatalogRow {
                    table: table.to_string(),
                    rowid: rejection.rowid,
                },
                ErrorCode::RecordDecode,
                rejection.reason.clone(),
            );
        }
    }

    fn warn(&mut self, scope: WarningScope, code: ErrorCode, message: String) {
        warn!(%scope, %code, "{message}");
        self.warnings.push(Warning::new(scope, code, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semlens_storage::Field;

    fn row(rowid: i64, values: Vec<RecordValue>) -> CatalogRow {
        CatalogRow {
            rowid,
            fields: values
                .into_iter()
                .map(|value| Field {
                    serial_type: 0,
                    value,
                })
                .collect(),
        }
    }

    fn layout() -> TableLayout {
        TableLayout {
            columns: vec!["ID".into(), "Name".into(), "IsHidden".into(), "Extra".into()],
            rowid_alias: Some(0),
        }
    }

    #[test]
    fn test_row_view_alias_and_missing() {
        let rows = CatalogTableRows::new(
            "Table",
            layout(),
            vec![row(
                5,
                vec![
                    RecordValue::Null,
                    RecordValue::Text("Sales".into()),
                    RecordValue::Bool(true),
                ],
            )],
        );
        let view = rows.iter().next().unwrap();
        assert_eq!(view.id(), 5);
        assert_eq!(view.int("id"), Some(5));
        assert_eq!(view.text("Name"), Some("Sales"));
        assert!(view.flag("IsHidden"));
        // Shorter record than the layout
        assert_eq!(view.value("Extra"), None);
        assert!(!view.flag("Extra"));
        // Unknown column
        assert_eq!(view.text("Nope"), None);
    }

    #[test]
    fn test_empty_text_is_absent() {
        let rows = CatalogTableRows::new(
            "Table",
            layout(),
            vec![row(1, vec![RecordValue::Null, RecordValue::Text(String::new())])],
        );
        assert_eq!(rows.iter().next().unwrap().text("Name"), None);
    }

    #[test]
    fn test_id_without_alias() {
        let layout = TableLayout {
            columns: vec!["Name".into()],
            rowid_alias: None,
        };
        let rows = CatalogTableRows::new("X", layout, vec![row(9, vec![RecordValue::Null])]);
        assert_eq!(rows.iter().next().unwrap().id(), 9);
    }
}
