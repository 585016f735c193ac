//! System-object filtering.
//!
//! The engine keeps internal tables next to the user's (hierarchy caches,
//! relationship indexes, auto-generated date tables). They are recognised
//! by name prefix and removed from every surface the model exposes.

use crate::catalog::ModelSchema;

/// Name prefixes of engine-internal objects.
pub const SYSTEM_PREFIXES: &[&str] = &[
    // Hierarchy cache
    "H$",
    // Relationship index
    "R$",
    // User hierarchy
    "U$",
    "LocalDateTable_",
    "DateTableTemplate_",
];

/// Returns true if a table name denotes an engine-internal object.
pub fn is_system_object(name: &str) -> bool {
    SYSTEM_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Drops system object names, keeping the others in order.
pub fn filter_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| !is_system_object(name))
        .collect()
}

/// Removes system tables from a schema, together with the measures,
/// relationships and partitions that refer to them.
pub fn filter_schema(schema: ModelSchema) -> ModelSchema {
    let ModelSchema {
        tables,
        measures,
        relationships,
        partitions,
    } = schema;

    ModelSchema {
        tables: tables
            .into_iter()
            .filter(|t| !is_system_object(&t.name))
            .collect(),
        measures: measures
            .into_iter()
            .filter(|m| !is_system_object(&m.table))
            .collect(),
        relationships: relationships
            .into_iter()
            .filter(|r| !is_system_object(&r.from_table) && !is_system_object(&r.to_table))
            .collect(),
        partitions: partitions
            .into_iter()
            .filter(|p| !is_system_object(&p.table))
            .collect(),
    }
}
