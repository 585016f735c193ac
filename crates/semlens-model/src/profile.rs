//! Data profile of materialized tables.
//!
//! Per-column counts over decoded values: rows, blanks, distinct non-blank
//! values, and the smallest and largest value for ordered types.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDateTime;
use semlens_common::types::Decimal;
use semlens_common::{CellValue, DataType};
use serde::Serialize;

use crate::catalog::ColumnKind;
use crate::vertipaq::{MaterializedColumn, MaterializedTable};

/// Profile of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    /// Table name.
    pub table: String,
    /// Number of rows.
    pub row_count: usize,
    /// One entry per column, in column order.
    pub columns: Vec<ColumnStats>,
}

impl TableProfile {
    /// Finds a column profile by name.
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Statistics for a single column.
///
/// Counts are `None` for formula columns, which hold no stored values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    /// Column name.
    pub name: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Data or formula column.
    pub kind: ColumnKind,
    /// Number of rows.
    pub row_count: usize,
    /// Number of distinct non-blank values.
    pub distinct_count: Option<usize>,
    /// Number of blank values.
    pub null_count: Option<usize>,
    /// Smallest non-blank value, for ordered types.
    pub min_value: Option<CellValue>,
    /// Largest non-blank value, for ordered types.
    pub max_value: Option<CellValue>,
}

/// Profiles every column of a table.
pub fn profile(table: &MaterializedTable) -> TableProfile {
    TableProfile {
        table: table.name.clone(),
        row_count: table.row_count,
        columns: table
            .columns
            .iter()
            .map(|c| column_stats(c, table.row_count))
            .collect(),
    }
}

fn column_stats(column: &MaterializedColumn, row_count: usize) -> ColumnStats {
    let mut stats = ColumnStats {
        name: column.name.clone(),
        data_type: column.data_type,
        kind: column.kind,
        row_count,
        distinct_count: None,
        null_count: None,
        min_value: None,
        max_value: None,
    };
    let Some(values) = &column.values else {
        return stats;
    };

    let mut distinct = HashSet::new();
    let mut nulls = 0;
    let mut min: Option<&CellValue> = None;
    let mut max: Option<&CellValue> = None;

    for value in values {
        let Some(key) = ValueKey::of(value) else {
            nulls += 1;
            continue;
        };
        distinct.insert(key);

        if min.map_or(true, |m| compare(value, m) == Some(Ordering::Less)) {
            min = Some(value);
        }
        if max.map_or(true, |m| compare(value, m) == Some(Ordering::Greater)) {
            max = Some(value);
        }
    }

    stats.distinct_count = Some(distinct.len());
    stats.null_count = Some(nulls);
    if is_ordered(column.data_type) {
        stats.min_value = min.cloned();
        stats.max_value = max.cloned();
    }
    stats
}

fn is_ordered(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::String
            | DataType::Int64
            | DataType::Double
            | DataType::Decimal
            | DataType::DateTime
    )
}

/// Orders two values of the same kind; `None` across kinds and for NaN.
fn compare(a: &CellValue, b: &CellValue) -> Option<Ordering> {
    match (a, b) {
        (CellValue::Text(a), CellValue::Text(b)) => Some(a.cmp(b)),
        (CellValue::Int64(a), CellValue::Int64(b)) => Some(a.cmp(b)),
        (CellValue::Double(a), CellValue::Double(b)) => a.partial_cmp(b),
        (CellValue::Decimal(a), CellValue::Decimal(b)) => Some(compare_decimal(*a, *b)),
        (CellValue::DateTime(a), CellValue::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_decimal(a: Decimal, b: Decimal) -> Ordering {
    if a.scale == b.scale {
        return a.mantissa.cmp(&b.mantissa);
    }
    // Rescale both to the wider scale in i128
    let scale = a.scale.max(b.scale);
    let widen = |d: Decimal| i128::from(d.mantissa) * 10i128.pow(scale - d.scale);
    widen(a).cmp(&widen(b))
}

/// Hashable view of a non-blank value. Floats compare by bit pattern.
#[derive(Debug, PartialEq, Eq, Hash)]
enum ValueKey<'a> {
    Text(&'a str),
    Int(i64),
    Float(u64),
    Decimal(i64, u32),
    DateTime(NaiveDateTime),
    Bool(bool),
    Bytes(&'a [u8]),
}

impl<'a> ValueKey<'a> {
    fn of(value: &'a CellValue) -> Option<Self> {
        Some(match value {
            CellValue::Null => return None,
            CellValue::Text(s) => Self::Text(s),
            CellValue::Int64(v) => Self::Int(*v),
            CellValue::Double(v) => Self::Float(v.to_bits()),
            CellValue::Decimal(d) => Self::Decimal(d.mantissa, d.scale),
            CellValue::DateTime(v) => Self::DateTime(*v),
            CellValue::Boolean(v) => Self::Bool(*v),
            CellValue::Binary(b) => Self::Bytes(b),
        })
    }
}
