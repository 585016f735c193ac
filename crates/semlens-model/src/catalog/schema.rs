//! Typed catalog projections.
//!
//! [`CatalogGraph`] is the resolved catalog: tables and their columns with
//! storage references already followed. [`ModelSchema`] is the
//! serializable surface derived from it for front-ends.

use std::collections::BTreeMap;
use std::fmt;

use semlens_common::types::{
    ColumnId, ColumnStorageId, DictionaryId, PartitionStorageId, StorageFileId, TableId,
};
use semlens_common::DataType;
use serde::Serialize;

// =============================================================================
// Catalog Graph
// =============================================================================

/// How a column's values come about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
    /// Imported data held in columnar storage.
    Data,
    /// Computed from a formula on demand.
    Calculated,
    /// Column of a table defined by a formula.
    CalculatedTableColumn,
}

impl ColumnKind {
    /// Catalog code of row-number pseudo-columns, which are never exposed.
    pub const ROW_NUMBER_CODE: i64 = 3;

    /// Maps a catalog column type code; `None` for row-number columns.
    pub fn from_code(code: Option<i64>) -> Option<Self> {
        match code {
            Some(Self::ROW_NUMBER_CODE) => None,
            Some(2) => Some(Self::Calculated),
            Some(4) => Some(Self::CalculatedTableColumn),
            _ => Some(Self::Data),
        }
    }

    /// Returns true if values are computed rather than stored.
    pub fn is_formula(self) -> bool {
        !matches!(self, Self::Data)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::Calculated => write!(f, "calculated"),
            Self::CalculatedTableColumn => write!(f, "calculatedTableColumn"),
        }
    }
}

/// A storage file referenced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStorageRef {
    /// Storage file id.
    pub id: StorageFileId,
    /// Slice name in the directory container.
    pub file_name: String,
}

/// Dictionary of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDictionaryRef {
    /// Dictionary storage id.
    pub id: DictionaryId,
    /// Slice holding the dictionary.
    pub file: CatalogStorageRef,
    /// Catalog nullability flag.
    pub is_nullable: bool,
}

/// One packed-index segment of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPartition {
    /// Column partition storage id.
    pub id: PartitionStorageId,
    /// Ordering key: the partition storage the segment belongs to.
    pub order: i64,
    /// Slice holding the packed indices.
    pub file: CatalogStorageRef,
    /// Data version, if recorded.
    pub data_version: Option<i64>,
}

/// A resolved catalog column.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogColumn {
    /// Column id.
    pub id: ColumnId,
    /// Owning table.
    pub table_id: TableId,
    /// Display name.
    pub name: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Data or formula column.
    pub kind: ColumnKind,
    /// Hidden from report views.
    pub is_hidden: bool,
    /// Formula, for calculated columns.
    pub expression: Option<String>,
    /// Format string.
    pub format_string: Option<String>,
    /// Source column name in the upstream query.
    pub source_column: Option<String>,
    /// Column storage id.
    pub storage_id: Option<ColumnStorageId>,
    /// Dictionary, once resolved.
    pub dictionary: Option<CatalogDictionaryRef>,
    /// Index segments in ascending order.
    pub partitions: Vec<CatalogPartition>,
    /// Hierarchy storage file, if any.
    pub hierarchy: Option<CatalogStorageRef>,
    /// Distinct value count statistic.
    pub distinct_count: Option<i64>,
    /// Row count statistic.
    pub row_count_statistic: Option<i64>,
    /// References that could not be resolved.
    pub issues: Vec<String>,
}

impl CatalogColumn {
    /// Returns true if the column's stored values can be decoded.
    pub fn is_materializable(&self) -> bool {
        self.kind == ColumnKind::Data
            && self.issues.is_empty()
            && self.dictionary.is_some()
            && !self.partitions.is_empty()
    }
}

/// A resolved catalog table.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTable {
    /// Table id.
    pub id: TableId,
    /// Table name.
    pub name: String,
    /// Hidden from report views.
    pub is_hidden: bool,
    /// Description.
    pub description: Option<String>,
    /// Columns in catalog id order, row-number columns excluded.
    pub columns: Vec<CatalogColumn>,
}

impl CatalogTable {
    /// Returns the largest row count statistic among the columns.
    pub fn row_count_statistic(&self) -> Option<i64> {
        self.columns
            .iter()
            .filter_map(|c| c.row_count_statistic)
            .max()
    }

    /// Finds a column by name.
    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The resolved catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogGraph {
    /// Tables keyed by id.
    pub tables: BTreeMap<TableId, CatalogTable>,
    /// Measures.
    pub measures: Vec<Measure>,
    /// Relationships.
    pub relationships: Vec<Relationship>,
    /// Partitions (table data sources).
    pub partitions: Vec<Partition>,
}

impl CatalogGraph {
    /// Finds a table by name.
    ///
    /// Names are unique in a well-formed catalog; on duplicates the lowest
    /// id wins.
    pub fn table_by_name(&self, name: &str) -> Option<&CatalogTable> {
        self.tables.values().find(|t| t.name == name)
    }

    /// Returns table names in id order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name.clone()).collect()
    }
}

// =============================================================================
// Schema Surface
// =============================================================================

/// A measure (named formula) of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Home table name.
    pub table: String,
    /// Measure name.
    pub name: String,
    /// Formula.
    pub expression: Option<String>,
    /// Format string.
    pub format_string: Option<String>,
    /// Display folder.
    pub display_folder: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Hidden from report views.
    pub is_hidden: bool,
}

/// Cardinality of one end of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// At most one row matches.
    One,
    /// Any number of rows match.
    Many,
    /// Code not recognized.
    Unknown,
}

impl Cardinality {
    /// Maps a catalog cardinality code.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::One,
            Some(2) => Self::Many,
            _ => Self::Unknown,
        }
    }
}

/// Filter propagation of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CrossFilter {
    /// Filters flow from the one side to the many side.
    OneDirection,
    /// Filters flow both ways.
    BothDirections,
    /// Direction chosen by the engine.
    Automatic,
    /// Code not recognized.
    Unknown,
}

impl CrossFilter {
    /// Maps a catalog cross-filtering code.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::OneDirection,
            Some(2) => Self::BothDirections,
            Some(3) => Self::Automatic,
            _ => Self::Unknown,
        }
    }
}

/// A relationship between two table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Relationship name.
    pub name: Option<String>,
    /// Source table.
    pub from_table: String,
    /// Source column.
    pub from_column: String,
    /// Source cardinality.
    pub from_cardinality: Cardinality,
    /// Target table.
    pub to_table: String,
    /// Target column.
    pub to_column: String,
    /// Target cardinality.
    pub to_cardinality: Cardinality,
    /// Active relationships take part in filtering by default.
    pub is_active: bool,
    /// Filter propagation.
    pub cross_filter: CrossFilter,
}

/// A data source definition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Owning table name.
    pub table: String,
    /// Partition name.
    pub name: String,
    /// Source query.
    pub query_definition: Option<String>,
}

/// Column entry of the schema surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    /// Column name.
    pub name: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Data or formula column.
    pub kind: ColumnKind,
    /// Hidden from report views.
    pub is_hidden: bool,
    /// Formula, for calculated columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Format string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
    /// Source column name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
}

/// Table entry of the schema surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    /// Table name.
    pub name: String,
    /// Hidden from report views.
    pub is_hidden: bool,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Row count statistic from the catalog.
    pub row_count: Option<i64>,
    /// Columns.
    pub columns: Vec<SchemaColumn>,
}

/// Serializable schema of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    /// Tables in catalog order.
    pub tables: Vec<SchemaTable>,
    /// Measures.
    pub measures: Vec<Measure>,
    /// Relationships.
    pub relationships: Vec<Relationship>,
    /// Partitions.
    pub partitions: Vec<Partition>,
}

impl ModelSchema {
    /// Builds the unfiltered schema surface of a catalog.
    pub fn from_graph(graph: &CatalogGraph) -> Self {
        let tables = graph
            .tables
            .values()
            .map(|table| SchemaTable {
                name: table.name.clone(),
                is_hidden: table.is_hidden,
                description: table.description.clone(),
                row_count: table.row_count_statistic(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| SchemaColumn {
                        name: c.name.clone(),
                        data_type: c.data_type,
                        kind: c.kind,
                        is_hidden: c.is_hidden,
                        expression: c.expression.clone(),
                        format_string: c.format_string.clone(),
                        source_column: c.source_column.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            tables,
            measures: graph.measures.clone(),
            relationships: graph.relationships.clone(),
            partitions: graph.partitions.clone(),
        }
    }

    /// Finds a table by name.
    pub fn table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns the table names in order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(id: i64, name: &str, stat: Option<i64>) -> CatalogColumn {
        CatalogColumn {
            id: ColumnId::new(id),
            table_id: TableId::new(1),
            name: name.to_string(),
            data_type: DataType::String,
            kind: ColumnKind::Data,
            is_hidden: false,
            expression: None,
            format_string: None,
            source_column: None,
            storage_id: None,
            dictionary: None,
            partitions: Vec::new(),
            hierarchy: None,
            distinct_count: None,
            row_count_statistic: stat,
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_column_kind_codes() {
        assert_eq!(ColumnKind::from_code(Some(1)), Some(ColumnKind::Data));
        assert_eq!(ColumnKind::from_code(None), Some(ColumnKind::Data));
        assert_eq!(ColumnKind::from_code(Some(2)), Some(ColumnKind::Calculated));
        assert_eq!(ColumnKind::from_code(Some(3)), None);
        assert!(ColumnKind::CalculatedTableColumn.is_formula());
    }

    #[test]
    fn test_row_count_statistic() {
        let table = CatalogTable {
            id: TableId::new(1),
            name: "T".into(),
            is_hidden: false,
            description: None,
            columns: vec![column(1, "A", Some(3)), column(2, "B", Some(7)), column(3, "C", None)],
        };
        assert_eq!(table.row_count_statistic(), Some(7));
        assert!(table.column("B").is_some());
        assert!(!table.columns[0].is_materializable());
    }

    #[test]
    fn test_schema_json_shape() {
        let mut graph = CatalogGraph::default();
        graph.tables.insert(
            TableId::new(1),
            CatalogTable {
                id: TableId::new(1),
                name: "Sales".into(),
                is_hidden: false,
                description: None,
                columns: vec![column(1, "Name", Some(2))],
            },
        );
        let schema = ModelSchema::from_graph(&graph);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["tables"][0]["name"], "Sales");
        assert_eq!(json["tables"][0]["rowCount"], 2);
        assert_eq!(json["tables"][0]["columns"][0]["dataType"], "string");
        assert!(json["tables"][0]["columns"][0].get("expression").is_none());
    }
}
