//! Catalog projection.
//!
//! Reads the fixed set of catalog tables and joins them into a
//! [`CatalogGraph`]:
//!
//! ```text
//! Table ◀── Column ──▶ ColumnStorage ──▶ DictionaryStorage ──▶ StorageFile
//!             │              │
//!             │              └──▶ ColumnPartitionStorage (n) ──▶ StorageFile
//!             └──▶ AttributeHierarchy ──▶ AttributeHierarchyStorage ──▶ StorageFile
//! ```
//!
//! Dangling references never abort projection. The affected column keeps
//! its place in the schema without materializable data and the problem is
//! reported as a `CatalogConsistency` warning.

use std::collections::HashMap;

use semlens_common::types::{
    ColumnId, ColumnStorageId, DictionaryId, PartitionStorageId, StorageFileId, TableId,
};
use semlens_common::{DataType, ErrorCode, LensError, LensResult, Warning, WarningScope};
use semlens_storage::PageEngine;
use tracing::{debug, warn};

use super::ddl::TableLayout;
use super::rows::{CatalogReader, CatalogTableRows, RowView};
use super::schema::{
    CatalogColumn, CatalogDictionaryRef, CatalogGraph, CatalogPartition, CatalogStorageRef,
    CatalogTable, Cardinality, ColumnKind, CrossFilter, Measure, Partition, Relationship,
};

/// Catalog tables a model cannot be read without.
pub const REQUIRED_TABLES: &[&str] = &[
    "Table",
    "Column",
    "ColumnStorage",
    "ColumnPartitionStorage",
    "DictionaryStorage",
    "StorageFile",
    "AttributeHierarchy",
    "AttributeHierarchyStorage",
];

/// Catalog tables read when present.
pub const OPTIONAL_TABLES: &[&str] = &["Measure", "Relationship", "Partition"];

/// Result of projecting a catalog.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    /// The resolved catalog.
    pub graph: CatalogGraph,
    /// Contained problems found while projecting.
    pub warnings: Vec<Warning>,
}

struct DictionaryRow {
    file: Option<i64>,
    is_nullable: bool,
}

struct ColumnStorageRow {
    dictionary: Option<i64>,
    distinct_count: Option<i64>,
    row_count: Option<i64>,
}

struct SegmentRow {
    id: i64,
    order: i64,
    file: Option<i64>,
    data_version: Option<i64>,
}

/// Lookup tables over the storage-side catalog tables.
#[derive(Default)]
struct StorageIndex {
    files: HashMap<i64, String>,
    dictionaries: HashMap<i64, DictionaryRow>,
    dictionaries_by_storage: HashMap<i64, i64>,
    column_storages: HashMap<i64, ColumnStorageRow>,
    segments: HashMap<i64, Vec<SegmentRow>>,
    hierarchy_files: HashMap<i64, Option<i64>>,
    hierarchies_by_column: HashMap<i64, i64>,
}

impl StorageIndex {
    fn build(tables: &HashMap<&'static str, CatalogTableRows>) -> Self {
        let mut index = Self::default();
        let rows = |name: &str| tables.get(name).into_iter().flat_map(|t| t.iter());

        for row in rows("StorageFile") {
            if let Some(file_name) = row.text("FileName") {
                index.files.insert(row.id(), file_name.to_string());
            }
        }
        for row in rows("DictionaryStorage") {
            let storage = row.int("ColumnStorageID");
            if let Some(storage) = storage {
                index.dictionaries_by_storage.entry(storage).or_insert(row.id());
            }
            index.dictionaries.insert(
                row.id(),
                DictionaryRow {
                    file: row.int("StorageFileID"),
                    is_nullable: row.flag("IsNullable"),
                },
            );
        }
        for row in rows("ColumnStorage") {
            index.column_storages.insert(
                row.id(),
                ColumnStorageRow {
                    dictionary: row.int("DictionaryStorageID"),
                    distinct_count: row.int("Statistics_DistinctStates"),
                    row_count: row.int("Statistics_RowCount"),
                },
            );
        }
        for row in rows("ColumnPartitionStorage") {
            let Some(storage) = row.int("ColumnStorageID") else {
                continue;
            };
            index.segments.entry(storage).or_default().push(SegmentRow {
                id: row.id(),
                order: row.int("PartitionStorageID").unwrap_or_else(|| row.id()),
                file: row.int("StorageFileID"),
                data_version: row.int("DataVersion"),
            });
        }
        for segments in index.segments.values_mut() {
            segments.sort_by_key(|s| (s.order, s.id));
        }
        for row in rows("AttributeHierarchyStorage") {
            index
                .hierarchy_files
                .insert(row.id(), row.int("StorageFileID"));
        }
        for row in rows("AttributeHierarchy") {
            if let (Some(column), Some(storage)) =
                (row.int("ColumnID"), row.int("AttributeHierarchyStorageID"))
            {
                index.hierarchies_by_column.entry(column).or_insert(storage);
            }
        }
        index
    }

    fn file(
        &self,
        id: Option<i64>,
        what: &str,
        issues: &mut Vec<String>,
    ) -> Option<CatalogStorageRef> {
        let Some(id) = id else {
            issues.push(format!("{what} has no storage file"));
            return None;
        };
        match self.files.get(&id) {
            Some(file_name) => Some(CatalogStorageRef {
                id: StorageFileId::new(id),
                file_name: file_name.clone(),
            }),
            None => {
                issues.push(format!("{what} references missing StorageFile {id}"));
                None
            }
        }
    }

    /// Follows a column's storage references, collecting what is missing.
    fn resolve(&self, column: &mut CatalogColumn, column_storage: Option<i64>) {
        if let Some(storage) = self
            .hierarchies_by_column
            .get(&column.id.as_i64())
            .and_then(|hs| self.hierarchy_files.get(hs))
            .copied()
            .flatten()
        {
            column.hierarchy = self.files.get(&storage).map(|file_name| CatalogStorageRef {
                id: StorageFileId::new(storage),
                file_name: file_name.clone(),
            });
        }

        if column.kind.is_formula() {
            return;
        }
        let mut issues = Vec::new();

        let Some(storage_id) = column_storage else {
            column.issues.push("column has no ColumnStorage".to_string());
            return;
        };
        column.storage_id = Some(ColumnStorageId::new(storage_id));
        let Some(storage) = self.column_storages.get(&storage_id) else {
            column
                .issues
                .push(format!("ColumnStorage {storage_id} not found"));
            return;
        };
        column.distinct_count = storage.distinct_count;
        column.row_count_statistic = storage.row_count;

        let dictionary_id = storage
            .dictionary
            .or_else(|| self.dictionaries_by_storage.get(&storage_id).copied());
        match dictionary_id {
            None => issues.push(format!("ColumnStorage {storage_id} has no DictionaryStorage")),
            Some(id) => match self.dictionaries.get(&id) {
                None => issues.push(format!("DictionaryStorage {id} not found")),
                Some(dictionary) => {
                    if let Some(file) =
                        self.file(dictionary.file, &format!("DictionaryStorage {id}"), &mut issues)
                    {
                        column.dictionary = Some(CatalogDictionaryRef {
                            id: DictionaryId::new(id),
                            file,
                            is_nullable: dictionary.is_nullable,
                        });
                    }
                }
            },
        }

        match self.segments.get(&storage_id) {
            None => issues.push(format!(
                "ColumnStorage {storage_id} has no ColumnPartitionStorage"
            )),
            Some(segments) => {
                for segment in segments {
                    let what = format!("ColumnPartitionStorage {}", segment.id);
                    if let Some(file) = self.file(segment.file, &what, &mut issues) {
                        column.partitions.push(CatalogPartition {
                            id: PartitionStorageId::new(segment.id),
                            order: segment.order,
                            file,
                            data_version: segment.data_version,
                        });
                    }
                }
            }
        }

        column.issues.extend(issues);
    }
}

/// Projects the catalog database into a [`CatalogGraph`].
///
/// # Errors
///
/// Returns `PageFormat` if a catalog tree cannot be traversed, and
/// `CatalogConsistency` if a required catalog table is not declared.
pub fn project(engine: &PageEngine) -> LensResult<Projection> {
    let mut reader = CatalogReader::open(engine)?;

    let mut tables = HashMap::new();
    for &name in REQUIRED_TABLES {
        let rows = reader
            .read(name)?
            .ok_or_else(|| LensError::catalog(name, "required catalog table is missing"))?;
        tables.insert(name, rows);
    }
    for &name in OPTIONAL_TABLES {
        let rows = reader.read(name)?.unwrap_or_else(|| {
            debug!(table = name, "optional catalog table absent");
            CatalogTableRows::new(name, TableLayout::default(), Vec::new())
        });
        tables.insert(name, rows);
    }

    let mut warnings = reader.into_warnings();
    let index = StorageIndex::build(&tables);
    let mut graph = CatalogGraph::default();

    for row in tables["Table"].iter() {
        let id = TableId::new(row.id());
        graph.tables.insert(
            id,
            CatalogTable {
                id,
                name: row
                    .text("Name")
                    .map_or_else(|| format!("Table{}", id), str::to_string),
                is_hidden: row.flag("IsHidden"),
                description: row.text("Description").map(str::to_string),
                columns: Vec::new(),
            },
        );
    }

    let mut column_names: HashMap<i64, (TableId, String)> = HashMap::new();
    let mut column_rows: Vec<RowView<'_>> = tables["Column"].iter().collect();
    column_rows.sort_by_key(RowView::id);

    for row in column_rows {
        let Some(kind) = ColumnKind::from_code(row.int("Type")) else {
            continue;
        };
        let id = ColumnId::new(row.id());
        let Some(table) = row
            .int("TableID")
            .map(TableId::new)
            .and_then(|t| graph.tables.get_mut(&t))
        else {
            push_warning(
                &mut warnings,
                WarningScope::Load,
                format!(
                    "column {id} references unknown table {}",
                    row.int("TableID").map_or("NULL".to_string(), |t| t.to_string())
                ),
            );
            continue;
        };

        let explicit = row.int("ExplicitDataType");
        let type_code = match explicit {
            Some(code) if code != DataType::AUTOMATIC_CODE => Some(code),
            _ => row.int("InferredDataType"),
        };

        let mut column = CatalogColumn {
            id,
            table_id: table.id,
            name: row
                .text("ExplicitName")
                .or_else(|| row.text("InferredName"))
                .map_or_else(|| format!("Column{id}"), str::to_string),
            data_type: type_code.map_or(DataType::Unknown, DataType::from_code),
            kind,
            is_hidden: row.flag("IsHidden"),
            expression: row.text("Expression").map(str::to_string),
            format_string: row.text("FormatString").map(str::to_string),
            source_column: row.text("SourceColumn").map(str::to_string),
            storage_id: None,
            dictionary: None,
            partitions: Vec::new(),
            hierarchy: None,
            distinct_count: None,
            row_count_statistic: None,
            issues: Vec::new(),
        };
        index.resolve(&mut column, row.int("ColumnStorageID"));

        for issue in &column.issues {
            push_warning(
                &mut warnings,
                WarningScope::Column {
                    table: table.name.clone(),
                    column: column.name.clone(),
                },
                issue.clone(),
            );
        }
        column_names.insert(id.as_i64(), (table.id, column.name.clone()));
        table.columns.push(column);
    }

    let table_name = |graph: &CatalogGraph, id: Option<i64>| {
        id.and_then(|id| graph.tables.get(&TableId::new(id)))
            .map(|t| t.name.clone())
    };

    for row in tables["Measure"].iter() {
        let Some(table) = table_name(&graph, row.int("TableID")) else {
            push_warning(
                &mut warnings,
                WarningScope::Load,
                format!("measure {} references an unknown table", row.id()),
            );
            continue;
        };
        graph.measures.push(Measure {
            table,
            name: row
                .text("Name")
                .map_or_else(|| format!("Measure{}", row.id()), str::to_string),
            expression: row.text("Expression").map(str::to_string),
            format_string: row.text("FormatString").map(str::to_string),
            display_folder: row.text("DisplayFolder").map(str::to_string),
            description: row.text("Description").map(str::to_string),
            is_hidden: row.flag("IsHidden"),
        });
    }

    for row in tables["Relationship"].iter() {
        let end = |table: &str, column: &str| {
            let (table_id, column_name) = column_names.get(&row.int(column)?)?;
            let owner = table_name(&graph, Some(table_id.as_i64()))?;
            // A declared table must own the column
            row.int(table)
                .map_or(true, |t| t == table_id.as_i64())
                .then(|| (owner, column_name.clone()))
        };
        let (Some((from_table, from_column)), Some((to_table, to_column))) = (
            end("FromTableID", "FromColumnID"),
            end("ToTableID", "ToColumnID"),
        ) else {
            push_warning(
                &mut warnings,
                WarningScope::Load,
                format!("relationship {} has unresolved endpoints", row.id()),
            );
            continue;
        };
        graph.relationships.push(Relationship {
            name: row.text("Name").map(str::to_string),
            from_table,
            from_column,
            from_cardinality: Cardinality::from_code(row.int("FromCardinality")),
            to_table,
            to_column,
            to_cardinality: Cardinality::from_code(row.int("ToCardinality")),
            is_active: row.value("IsActive").is_none() || row.flag("IsActive"),
            cross_filter: CrossFilter::from_code(row.int("CrossFilteringBehavior")),
        });
    }

    for row in tables["Partition"].iter() {
        let Some(table) = table_name(&graph, row.int("TableID")) else {
            continue;
        };
        graph.partitions.push(Partition {
            table,
            name: row
                .text("Name")
                .map_or_else(|| format!("Partition{}", row.id()), str::to_string),
            query_definition: row.text("QueryDefinition").map(str::to_string),
        });
    }

    debug!(
        tables = graph.tables.len(),
        columns = column_names.len(),
        measures = graph.measures.len(),
        relationships = graph.relationships.len(),
        warnings = warnings.len(),
        "projected catalog"
    );

    Ok(Projection { graph, warnings })
}

fn push_warning(warnings: &mut Vec<Warning>, scope: WarningScope, message: String) {
    warn!(%scope, "{message}");
    warnings.push(Warning::new(scope, ErrorCode::CatalogConsistency, message));
}
