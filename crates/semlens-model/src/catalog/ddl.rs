//! Column layout of catalog tables.
//!
//! Catalog records store fields positionally, so the only way to know
//! which field is `ExplicitName` is the table's `CREATE TABLE` statement
//! in the schema table. The statement is parsed with `sqlparser`'s SQLite
//! dialect, which also accepts the `[bracketed]` identifiers the catalog
//! uses.
//!
//! A column declared `INTEGER PRIMARY KEY` (or the single column of a
//! table-level `PRIMARY KEY (...)` with type `INTEGER`) is an alias for
//! the rowid: its record field is stored as NULL and the value lives in
//! the B-tree key.

use semlens_common::{LensError, LensResult};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser as SqlParser;

/// Ordered column names of one catalog table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    /// Column names in declaration order.
    pub columns: Vec<String>,
    /// Position of the rowid alias column, if any.
    pub rowid_alias: Option<usize>,
}

impl TableLayout {
    /// Returns the position of a column (ASCII case-insensitive).
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Parses the column layout from a `CREATE TABLE` statement.
///
/// # Errors
///
/// Returns `CatalogConsistency` if the statement does not parse, is not a
/// `CREATE TABLE`, or declares no columns.
pub fn parse_create_table(table: &str, sql: &str) -> LensResult<TableLayout> {
    let err = |reason: String| LensError::catalog(table, format!("CREATE TABLE: {reason}"));

    let mut statements =
        SqlParser::parse_sql(&SQLiteDialect {}, sql).map_err(|e| err(e.to_string()))?;
    if statements.len() != 1 {
        return Err(err(format!("expected one statement, found {}", statements.len())));
    }

    let (columns, constraints) = match statements.remove(0) {
        sql_ast::Statement::CreateTable {
            columns,
            constraints,
            ..
        } => (columns, constraints),
        _ => return Err(err("not a CREATE TABLE statement".to_string())),
    };
    if columns.is_empty() {
        return Err(err("no columns".to_string()));
    }

    let mut rowid_alias = columns
        .iter()
        .position(|c| is_integer(c) && c.options.iter().any(|o| is_primary_key(&o.option)));

    if rowid_alias.is_none() {
        let keys = constraints.iter().find_map(|c| match c {
            sql_ast::TableConstraint::Unique {
                columns: keys,
                is_primary: true,
                ..
            } => Some(keys),
            _ => None,
        });
        if let Some([key]) = keys.map(Vec::as_slice) {
            rowid_alias = columns
                .iter()
                .position(|c| c.name.value.eq_ignore_ascii_case(&key.value) && is_integer(c));
        }
    }

    Ok(TableLayout {
        columns: columns.into_iter().map(|c| c.name.value).collect(),
        rowid_alias,
    })
}

/// Only the exact type name `INTEGER` makes a key column a rowid alias.
fn is_integer(column: &sql_ast::ColumnDef) -> bool {
    column.data_type.to_string().eq_ignore_ascii_case("INTEGER")
}

fn is_primary_key(option: &sql_ast::ColumnOption) -> bool {
    matches!(option, sql_ast::ColumnOption::Unique { is_primary: true, .. })
}
