//! Terminal rendering of model listings and table previews.

use comfy_table::{Cell, ContentArrangement, Table};
use semlens_common::{CellValue, Warning};
use semlens_model::catalog::{ModelSchema, SchemaTable};
use semlens_model::{MaterializedTable, TableProfile};

/// Creates a table with the shared preset.
fn new_table() -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        ""
    }
}

/// Formats the table listing.
pub fn format_tables(schema: &ModelSchema) -> String {
    let mut table = new_table();
    table.set_header(vec!["Table", "Columns", "Rows", "Hidden"]);
    for t in &schema.tables {
        table.add_row(vec![
            Cell::new(&t.name),
            Cell::new(t.columns.len()),
            Cell::new(t.row_count.map_or_else(String::new, |n| n.to_string())),
            Cell::new(yes_no(t.is_hidden)),
        ]);
    }
    table.to_string()
}

/// Formats the columns of one table.
pub fn format_columns(schema_table: &SchemaTable) -> String {
    let mut table = new_table();
    table.set_header(vec!["Column", "Type", "Kind", "Hidden", "Expression"]);
    for c in &schema_table.columns {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(c.data_type),
            Cell::new(c.kind),
            Cell::new(yes_no(c.is_hidden)),
            Cell::new(c.expression.as_deref().unwrap_or("")),
        ]);
    }
    table.to_string()
}

/// Formats the whole schema: one section per table, then measures and
/// relationships.
pub fn format_schema(schema: &ModelSchema) -> String {
    let mut out = String::new();
    for t in &schema.tables {
        out.push_str(&format!("{}\n", t.name));
        if let Some(description) = &t.description {
            out.push_str(&format!("  {description}\n"));
        }
        out.push_str(&format_columns(t));
        out.push_str("\n\n");
    }

    if !schema.measures.is_empty() {
        let mut table = new_table();
        table.set_header(vec!["Table", "Measure", "Expression"]);
        for m in &schema.measures {
            table.add_row(vec![
                Cell::new(&m.table),
                Cell::new(&m.name),
                Cell::new(m.expression.as_deref().unwrap_or("")),
            ]);
        }
        out.push_str("Measures\n");
        out.push_str(&table.to_string());
        out.push_str("\n\n");
    }

    if !schema.relationships.is_empty() {
        let mut table = new_table();
        table.set_header(vec!["From", "To", "Active"]);
        for r in &schema.relationships {
            table.add_row(vec![
                Cell::new(format!("'{}'[{}]", r.from_table, r.from_column)),
                Cell::new(format!("'{}'[{}]", r.to_table, r.to_column)),
                Cell::new(yes_no(r.is_active)),
            ]);
        }
        out.push_str("Relationships\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out
}

/// Formats the first `limit` rows of a materialized table.
pub fn format_preview(table: &MaterializedTable, limit: usize) -> String {
    let mut view = new_table();
    view.set_header(table.column_names());
    for row in table.rows().take(limit) {
        view.add_row(row.into_iter().map(|v| Cell::new(v.to_string())));
    }

    let mut out = view.to_string();
    if table.row_count > limit {
        out.push_str(&format!("\n({limit} of {} rows)", table.row_count));
    } else {
        out.push_str(&format!("\n({} rows)", table.row_count));
    }
    out
}

/// Formats a table profile, one row per column. Formula columns show
/// blank counts.
pub fn format_profile(profile: &TableProfile) -> String {
    let count = |n: Option<usize>| n.map_or_else(String::new, |n| n.to_string());
    let value = |v: &Option<CellValue>| v.as_ref().map_or_else(String::new, ToString::to_string);

    let mut table = new_table();
    table.set_header(vec!["Column", "Type", "Distinct", "Blank", "Min", "Max"]);
    for c in &profile.columns {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(c.data_type),
            Cell::new(count(c.distinct_count)),
            Cell::new(count(c.null_count)),
            Cell::new(value(&c.min_value)),
            Cell::new(value(&c.max_value)),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!("\n({} rows)", profile.row_count));
    out
}

/// Formats warnings, one per line.
pub fn format_warnings(warnings: &[Warning]) -> String {
    warnings
        .iter()
        .map(|w| format!("warning: {w}"))
        .collect::<Vec<_>>()
        .join("\n")
}
