//! CSV, JSON, and Parquet writers for materialized tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    new_null_array, Array, ArrayRef, BinaryArray, BooleanArray, Decimal128Array, Float64Array,
    Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use semlens_common::constants::DEFAULT_DECIMAL_SCALE;
use semlens_common::{CellValue, DataType};
use semlens_model::{MaterializedColumn, MaterializedTable};
use serde_json::{Map, Value as JsonValue};

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// A JSON array of row objects.
    Json,
    /// A Parquet file with one typed column per model column.
    Parquet,
}

impl ExportFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// Escapes a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes a table as CSV. Blank and formula cells are empty fields.
pub fn write_csv<W: Write>(table: &MaterializedTable, mut out: W) -> Result<()> {
    let header: Vec<String> = table.column_names().iter().map(|c| escape_csv(c)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in table.rows() {
        let values: Vec<String> = row.iter().map(|v| escape_csv(&v.to_string())).collect();
        writeln!(out, "{}", values.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// Writes a table as a pretty-printed JSON array of objects keyed by
/// column name.
pub fn write_json<W: Write>(table: &MaterializedTable, mut out: W) -> Result<()> {
    let names = table.column_names();
    let rows: Vec<JsonValue> = table
        .rows()
        .map(|row| -> serde_json::Result<JsonValue> {
            let mut obj = Map::new();
            for (name, value) in names.iter().zip(row) {
                obj.insert((*name).to_string(), serde_json::to_value(value)?);
            }
            Ok(JsonValue::Object(obj))
        })
        .collect::<serde_json::Result<_>>()?;
    serde_json::to_writer_pretty(&mut out, &rows)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Writes a table as a single-batch Parquet file.
///
/// Formula columns and values that do not match the declared type are
/// written as nulls.
pub fn write_parquet<W: Write + Send>(table: &MaterializedTable, out: W) -> Result<()> {
    let batch = record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(out, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Converts a table into an Arrow record batch.
pub fn record_batch(table: &MaterializedTable) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns.len());
    let mut arrays = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let array = column_array(column, table.row_count)?;
        fields.push(Field::new(&column.name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count));
    let batch =
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
    Ok(batch)
}

fn column_array(column: &MaterializedColumn, rows: usize) -> Result<ArrayRef> {
    let values = || (0..rows).map(|row| column.value(row));

    let array: ArrayRef = match column.data_type {
        DataType::Int64 => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::Int64(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Double => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::Double(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Boolean => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::Boolean(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        DataType::DateTime => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::DateTime(dt)) => Some(dt.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>(),
        ),
        DataType::Decimal => {
            // One scale per column: the widest one present
            let scale = values()
                .filter_map(|v| match v {
                    Some(CellValue::Decimal(d)) => Some(d.scale),
                    _ => None,
                })
                .max()
                .unwrap_or(DEFAULT_DECIMAL_SCALE);
            let array = values()
                .map(|v| match v {
                    Some(CellValue::Decimal(d)) => {
                        Some(i128::from(d.mantissa) * 10i128.pow(scale - d.scale))
                    }
                    _ => None,
                })
                .collect::<Decimal128Array>()
                .with_precision_and_scale(38, i8::try_from(scale)?)?;
            Arc::new(array)
        }
        DataType::Binary => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::Binary(b)) => Some(b.as_slice()),
                    _ => None,
                })
                .collect::<BinaryArray>(),
        ),
        DataType::String => Arc::new(
            values()
                .map(|v| match v {
                    Some(CellValue::Text(s)) => Some(s.as_str()),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
        // Undeclared types keep their display text
        DataType::Unknown => Arc::new(
            values()
                .map(|v| v.filter(|v| !v.is_null()).map(ToString::to_string))
                .collect::<StringArray>(),
        ),
    };

    if column.values.is_none() {
        return Ok(new_null_array(array.data_type(), rows));
    }
    Ok(array)
}

/// Maps a table name to a file stem that is safe on common filesystems.
pub fn file_stem(table: &str) -> String {
    let stem: String = table
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches(|c| c == ' ' || c == '.');
    if stem.is_empty() {
        "table".to_string()
    } else {
        stem.to_string()
    }
}

/// Writes `table` into `dir` and returns the file path.
pub fn export_table(
    table: &MaterializedTable,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", file_stem(&table.name), format.extension()));
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        ExportFormat::Csv => write_csv(table, writer)?,
        ExportFormat::Json => write_json(table, writer)?,
        ExportFormat::Parquet => write_parquet(table, writer)?,
    }
    Ok(path)
}
