//! Subcommand implementations.
//!
//! Each command takes a loaded model and returns the text to print, so
//! the rendering can be tested without a terminal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semlens_model::DataModel;
use tracing::{info, warn};

use crate::export::{export_table, ExportFormat};
use crate::formatter::{
    format_preview, format_profile, format_schema, format_tables, format_warnings,
};

/// Which tables to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// A single table by name.
    Table(String),
    /// Every visible table.
    All,
}

/// Lists the visible tables.
pub fn tables(model: &DataModel) -> String {
    format_tables(model.catalog())
}

/// Describes the schema as tables or JSON.
pub fn schema(model: &DataModel, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(model.catalog())?)
    } else {
        Ok(format_schema(model.catalog()))
    }
}

/// Decodes a table and renders its first `limit` rows, followed by any
/// warnings raised while decoding it.
pub fn preview(model: &DataModel, table: &str, limit: usize) -> Result<String> {
    let table = model.table(table)?;
    let mut out = format_preview(&table, limit);
    if table.has_warnings() {
        out.push('\n');
        out.push_str(&format_warnings(&table.warnings));
    }
    Ok(out)
}

/// Decodes a table and describes its columns as a table or JSON.
pub fn profile(model: &DataModel, table: &str, json: bool) -> Result<String> {
    let profile = model.profile(table)?;
    if json {
        Ok(serde_json::to_string_pretty(&profile)?)
    } else {
        Ok(format_profile(&profile))
    }
}

/// Decodes and writes tables into `dir`, creating it if needed. Returns
/// the written paths.
pub fn export(
    model: &DataModel,
    target: &ExportTarget,
    format: ExportFormat,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let tables = match target {
        ExportTarget::Table(name) => vec![model.table(name)?],
        ExportTarget::All => model.materialize_all()?,
    };

    let mut written = Vec::with_capacity(tables.len());
    for table in &tables {
        for w in &table.warnings {
            warn!("{w}");
        }
        let path = export_table(table, format, dir)?;
        info!(
            table = %table.name,
            rows = table.row_count,
            path = %path.display(),
            "exported"
        );
        written.push(path);
    }
    Ok(written)
}
