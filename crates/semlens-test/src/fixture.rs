//! Complete model fixtures.
//!
//! [`ModelFixture`] takes tables with their cell values and produces the
//! catalog database, the directory container, and the package archive a
//! real model would ship, with every id cross-referenced the way the
//! loader expects. Knobs remove or damage single pieces to exercise the
//! contained-failure paths.

use semlens_common::constants::{DEFAULT_CATALOG_SLICE, DEFAULT_DATA_MODEL_ENTRY};
use semlens_common::{CellValue, DataType};
use semlens_model::catalog::ColumnKind;

use crate::catalog_db::{CatalogDbBuilder, SqlValue};
use crate::columnar::{encode_dictionary, pack_indices, DictionaryLayout};
use crate::container::ContainerBuilder;
use crate::package::{zip_package, FramedCodec};

/// Catalog tables and their statements, in creation order.
pub const CATALOG_TABLES: &[(&str, &str)] = &[
    (
        "Table",
        "CREATE TABLE [Table] ([ID] INTEGER PRIMARY KEY, [ModelID] INTEGER, \
         [Name] TEXT, [IsHidden] BOOLEAN, [Description] TEXT)",
    ),
    (
        "Column",
        "CREATE TABLE [Column] ([ID] INTEGER PRIMARY KEY, [TableID] INTEGER, \
         [ExplicitName] TEXT, [InferredName] TEXT, [ExplicitDataType] INTEGER, \
         [InferredDataType] INTEGER, [Type] INTEGER, [IsHidden] BOOLEAN, \
         [Expression] TEXT, [FormatString] TEXT, [SourceColumn] TEXT, \
         [ColumnStorageID] INTEGER)",
    ),
    (
        "ColumnStorage",
        "CREATE TABLE [ColumnStorage] ([ID] INTEGER PRIMARY KEY, [ColumnID] INTEGER, \
         [DictionaryStorageID] INTEGER, [Statistics_DistinctStates] INTEGER, \
         [Statistics_RowCount] INTEGER)",
    ),
    (
        "ColumnPartitionStorage",
        "CREATE TABLE [ColumnPartitionStorage] ([ID] INTEGER PRIMARY KEY, \
         [ColumnStorageID] INTEGER, [PartitionStorageID] INTEGER, \
         [StorageFileID] INTEGER, [DataVersion] INTEGER)",
    ),
    (
        "DictionaryStorage",
        "CREATE TABLE [DictionaryStorage] ([ID] INTEGER PRIMARY KEY, \
         [ColumnStorageID] INTEGER, [StorageFileID] INTEGER, [IsNullable] BOOLEAN)",
    ),
    (
        "StorageFile",
        "CREATE TABLE [StorageFile] ([ID] INTEGER PRIMARY KEY, [FileName] TEXT)",
    ),
    (
        "AttributeHierarchy",
        "CREATE TABLE [AttributeHierarchy] ([ID] INTEGER PRIMARY KEY, [ColumnID] INTEGER, \
         [AttributeHierarchyStorageID] INTEGER)",
    ),
    (
        "AttributeHierarchyStorage",
        "CREATE TABLE [AttributeHierarchyStorage] ([ID] INTEGER PRIMARY KEY, \
         [StorageFileID] INTEGER)",
    ),
    (
        "Measure",
        "CREATE TABLE [Measure] ([ID] INTEGER PRIMARY KEY, [TableID] INTEGER, [Name] TEXT, \
         [Expression] TEXT, [FormatString] TEXT, [DisplayFolder] TEXT, \
         [Description] TEXT, [IsHidden] BOOLEAN)",
    ),
    (
        "Relationship",
        "CREATE TABLE [Relationship] ([ID] INTEGER PRIMARY KEY, [Name] TEXT, \
         [IsActive] BOOLEAN, [CrossFilteringBehavior] INTEGER, [FromTableID] INTEGER, \
         [FromColumnID] INTEGER, [FromCardinality] INTEGER, [ToTableID] INTEGER, \
         [ToColumnID] INTEGER, [ToCardinality] INTEGER)",
    ),
    (
        "Partition",
        "CREATE TABLE [Partition] ([ID] INTEGER PRIMARY KEY, [TableID] INTEGER, \
         [Name] TEXT, [QueryDefinition] TEXT)",
    ),
];

/// A column of a fixture table.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureColumn {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Data or formula column.
    pub kind: ColumnKind,
    /// Cell values, for data columns.
    pub values: Vec<CellValue>,
    /// Hidden flag.
    pub is_hidden: bool,
    /// Formula, for calculated columns.
    pub expression: Option<String>,
    /// Number of index segments the values are split into.
    pub segments: usize,
}

impl FixtureColumn {
    /// A data column with its values.
    pub fn data(name: &str, data_type: DataType, values: Vec<CellValue>) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            kind: ColumnKind::Data,
            values,
            is_hidden: false,
            expression: None,
            segments: 1,
        }
    }

    /// A text column.
    pub fn text(name: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| CellValue::Text(v.to_string())).collect();
        Self::data(name, DataType::String, values)
    }

    /// An integer column.
    pub fn int(name: &str, values: &[i64]) -> Self {
        Self::data(name, DataType::Int64, values.iter().map(|&v| CellValue::Int64(v)).collect())
    }

    /// A calculated column.
    pub fn calculated(name: &str, data_type: DataType, expression: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            kind: ColumnKind::Calculated,
            values: Vec::new(),
            is_hidden: false,
            expression: Some(expression.to_string()),
            segments: 0,
        }
    }

    /// Marks the column hidden.
    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    /// Splits the values over `segments` index slices.
    pub fn in_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(1);
        self
    }
}

/// A fixture table.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureTable {
    /// Table name.
    pub name: String,
    /// Columns in order.
    pub columns: Vec<FixtureColumn>,
    /// Hidden flag.
    pub is_hidden: bool,
    /// Description.
    pub description: Option<String>,
}

impl FixtureTable {
    /// Creates an empty table.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            is_hidden: false,
            description: None,
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: FixtureColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FixtureMeasure {
    table: String,
    name: String,
    expression: String,
}

#[derive(Debug, Clone, PartialEq)]
struct FixtureRelationship {
    from: (String, String),
    to: (String, String),
}

/// Builds a complete model package from table values.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFixture {
    tables: Vec<FixtureTable>,
    measures: Vec<FixtureMeasure>,
    relationships: Vec<FixtureRelationship>,
    without_dictionary_storage: Vec<(String, String)>,
    truncated_dictionaries: Vec<(String, String)>,
    omitted_catalog_tables: Vec<String>,
    page_size: usize,
}

impl Default for ModelFixture {
    fn default() -> Self {
        Self::new()
    }
}

struct Ids(i64);

impl Ids {
    fn allocate(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

impl ModelFixture {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            measures: Vec::new(),
            relationships: Vec::new(),
            without_dictionary_storage: Vec::new(),
            truncated_dictionaries: Vec::new(),
            omitted_catalog_tables: Vec::new(),
            page_size: 4096,
        }
    }

    /// Adds a table.
    pub fn table(mut self, table: FixtureTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a measure homed on `table`.
    pub fn measure(mut self, table: &str, name: &str, expression: &str) -> Self {
        self.measures.push(FixtureMeasure {
            table: table.to_string(),
            name: name.to_string(),
            expression: expression.to_string(),
        });
        self
    }

    /// Adds a many-to-one relationship between two columns.
    pub fn relationship(mut self, from: (&str, &str), to: (&str, &str)) -> Self {
        self.relationships.push(FixtureRelationship {
            from: (from.0.to_string(), from.1.to_string()),
            to: (to.0.to_string(), to.1.to_string()),
        });
        self
    }

    /// Leaves the column's `DictionaryStorage` row out of the catalog.
    pub fn without_dictionary_storage(mut self, table: &str, column: &str) -> Self {
        self.without_dictionary_storage
            .push((table.to_string(), column.to_string()));
        self
    }

    /// Cuts the column's dictionary slice short.
    pub fn truncate_dictionary(mut self, table: &str, column: &str) -> Self {
        self.truncated_dictionaries
            .push((table.to_string(), column.to_string()));
        self
    }

    /// Leaves a whole catalog table out of the database.
    pub fn omit_catalog_table(mut self, name: &str) -> Self {
        self.omitted_catalog_tables.push(name.to_string());
        self
    }

    /// Sets the catalog page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the catalog database and the data slices.
    pub fn assemble(&self) -> (CatalogDbBuilder, ContainerBuilder) {
        let mut db = CatalogDbBuilder::new().with_page_size(self.page_size);
        for (name, sql) in CATALOG_TABLES {
            if !self.omitted_catalog_tables.iter().any(|o| o == *name) {
                db.create_table(name, sql);
            }
        }
        let mut container = ContainerBuilder::new();
        let mut ids = Ids(0);
        let mut table_ids = Vec::new();
        let mut column_ids: Vec<((String, String), i64)> = Vec::new();

        for table in &self.tables {
            let tid = ids.allocate();
            table_ids.push((table.name.clone(), tid));
            insert(
                &mut db,
                "Table",
                tid,
                vec![
                    SqlValue::Null,
                    SqlValue::Int(1),
                    table.name.as_str().into(),
                    table.is_hidden.into(),
                    table.description.clone().into(),
                ],
            );

            // Every imported table carries a row-number pseudo-column
            let row_number = ids.allocate();
            insert(
                &mut db,
                "Column",
                row_number,
                column_row(tid, &format!("RowNumber-{tid}"), DataType::Int64, 3, true, None, None),
            );

            let pid = ids.allocate();
            insert(
                &mut db,
                "Partition",
                pid,
                vec![
                    SqlValue::Null,
                    SqlValue::Int(tid),
                    format!("{}-partition", table.name).into(),
                    format!("let Source = #table({{}}, {{}}) in Source /* {} */", table.name)
                        .into(),
                ],
            );

            for column in &table.columns {
                let cid = ids.allocate();
                column_ids.push(((table.name.clone(), column.name.clone()), cid));
                let key = (table.name.clone(), column.name.clone());

                if column.kind.is_formula() {
                    let code = if column.kind == ColumnKind::Calculated { 2 } else { 4 };
                    insert(
                        &mut db,
                        "Column",
                        cid,
                        column_row(
                            tid,
                            &column.name,
                            column.data_type,
                            code,
                            column.is_hidden,
                            column.expression.as_deref(),
                            None,
                        ),
                    );
                    continue;
                }

                let storage = ids.allocate();
                insert(
                    &mut db,
                    "Column",
                    cid,
                    column_row(
                        tid,
                        &column.name,
                        column.data_type,
                        1,
                        column.is_hidden,
                        None,
                        Some(storage),
                    ),
                );

                // Dictionary in first-appearance order, blank sentinel if any null
                let has_null = column.values.iter().any(CellValue::is_null);
                let mut distinct: Vec<CellValue> = Vec::new();
                for value in column.values.iter().filter(|v| !v.is_null()) {
                    if !distinct.contains(value) {
                        distinct.push(value.clone());
                    }
                }
                let offset = u32::from(has_null);
                let indices: Vec<u32> = column
                    .values
                    .iter()
                    .map(|v| match distinct.iter().position(|d| d == v) {
                        Some(p) => p as u32 + offset,
                        None => 0,
                    })
                    .collect();
                let dictionary_size = distinct.len() + usize::from(has_null);
                let layout = DictionaryLayout {
                    null_sentinel: has_null,
                    big_endian: false,
                };
                let mut dictionary_bytes = encode_dictionary(&distinct, layout);
                if self.truncated_dictionaries.contains(&key) {
                    dictionary_bytes.truncate(dictionary_bytes.len().saturating_sub(3).max(9));
                }

                let folder = format!("{} ({tid}).tbl", table.name);
                let dictionary_file = format!("{tid}.{cid}.dictionary");
                let dictionary_file_id = ids.allocate();
                container.add(format!("{folder}\\{dictionary_file}"), dictionary_bytes);
                insert(
                    &mut db,
                    "StorageFile",
                    dictionary_file_id,
                    vec![SqlValue::Null, dictionary_file.into()],
                );

                let dictionary_id = ids.allocate();
                let dictionary_ref = if self.without_dictionary_storage.contains(&key) {
                    SqlValue::Null
                } else {
                    insert(
                        &mut db,
                        "DictionaryStorage",
                        dictionary_id,
                        vec![
                            SqlValue::Null,
                            SqlValue::Int(storage),
                            SqlValue::Int(dictionary_file_id),
                            has_null.into(),
                        ],
                    );
                    SqlValue::Int(dictionary_id)
                };

                insert(
                    &mut db,
                    "ColumnStorage",
                    storage,
                    vec![
                        SqlValue::Null,
                        SqlValue::Int(cid),
                        dictionary_ref,
                        SqlValue::Int(dictionary_size as i64),
                        SqlValue::Int(column.values.len() as i64),
                    ],
                );

                // Segment rows are inserted with descending ids so ordering
                // has to come from PartitionStorageID
                let segments = column.segments.max(1);
                let chunk = column.values.len().div_ceil(segments).max(1);
                let mut segment_ids: Vec<i64> = (0..segments).map(|_| ids.allocate()).collect();
                segment_ids.reverse();
                for (k, segment_id) in segment_ids.into_iter().enumerate() {
                    let start = (k * chunk).min(indices.len());
                    let end = ((k + 1) * chunk).min(indices.len());
                    let file = format!("{tid}.{cid}.{k}.idx");
                    let file_id = ids.allocate();
                    container.add(
                        format!("{folder}\\{file}"),
                        pack_indices(&indices[start..end], dictionary_size),
                    );
                    insert(&mut db, "StorageFile", file_id, vec![SqlValue::Null, file.into()]);
                    insert(
                        &mut db,
                        "ColumnPartitionStorage",
                        segment_id,
                        vec![
                            SqlValue::Null,
                            SqlValue::Int(storage),
                            SqlValue::Int(k as i64 + 1),
                            SqlValue::Int(file_id),
                            SqlValue::Int(1),
                        ],
                    );
                }

                let hierarchy_storage = ids.allocate();
                let hierarchy_file_id = ids.allocate();
                let hierarchy_file = format!("{tid}.{cid}.hidx");
                container.add(format!("{folder}\\{hierarchy_file}"), Vec::new());
                insert(
                    &mut db,
                    "StorageFile",
                    hierarchy_file_id,
                    vec![SqlValue::Null, hierarchy_file.into()],
                );
                insert(
                    &mut db,
                    "AttributeHierarchyStorage",
                    hierarchy_storage,
                    vec![SqlValue::Null, SqlValue::Int(hierarchy_file_id)],
                );
                let hierarchy = ids.allocate();
                insert(
                    &mut db,
                    "AttributeHierarchy",
                    hierarchy,
                    vec![SqlValue::Null, SqlValue::Int(cid), SqlValue::Int(hierarchy_storage)],
                );
            }
        }

        let table_id = |name: &str| {
            table_ids
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id)
                .unwrap_or_else(|| panic!("unknown fixture table {name}"))
        };
        let column_id = |(table, column): &(String, String)| {
            column_ids
                .iter()
                .find(|((t, c), _)| t == table && c == column)
                .map(|(_, id)| *id)
                .unwrap_or_else(|| panic!("unknown fixture column {table}.{column}"))
        };

        for measure in &self.measures {
            let id = ids.allocate();
            insert(
                &mut db,
                "Measure",
                id,
                vec![
                    SqlValue::Null,
                    SqlValue::Int(table_id(&measure.table)),
                    measure.name.as_str().into(),
                    measure.expression.as_str().into(),
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::Null,
                    false.into(),
                ],
            );
        }

        for relationship in &self.relationships {
            let id = ids.allocate();
            insert(
                &mut db,
                "Relationship",
                id,
                vec![
                    SqlValue::Null,
                    format!("{}_{}", relationship.from.0, relationship.to.0).into(),
                    true.into(),
                    SqlValue::Int(1),
                    SqlValue::Int(table_id(&relationship.from.0)),
                    SqlValue::Int(column_id(&relationship.from)),
                    SqlValue::Int(2),
                    SqlValue::Int(table_id(&relationship.to.0)),
                    SqlValue::Int(column_id(&relationship.to)),
                    SqlValue::Int(1),
                ],
            );
        }

        (db, container)
    }

    /// Returns the catalog database bytes.
    pub fn catalog_db(&self) -> Vec<u8> {
        self.assemble().0.build()
    }

    /// Returns the decompressed model blob.
    pub fn blob(&self) -> Vec<u8> {
        let (db, mut container) = self.assemble();
        container.add(DEFAULT_CATALOG_SLICE, db.build());
        container.build()
    }

    /// Returns a package whose model entry is framed for [`FramedCodec`].
    pub fn package(&self) -> Vec<u8> {
        let compressed = FramedCodec::compress(&self.blob());
        zip_package(&[
            ("Version", b"1.28".as_slice()),
            (DEFAULT_DATA_MODEL_ENTRY, compressed.as_slice()),
        ])
    }

    /// Returns a package whose model entry is the blob itself.
    pub fn raw_package(&self) -> Vec<u8> {
        let blob = self.blob();
        zip_package(&[(DEFAULT_DATA_MODEL_ENTRY, blob.as_slice())])
    }
}

fn insert(db: &mut CatalogDbBuilder, table: &str, rowid: i64, values: Vec<SqlValue>) {
    if db.has_table(table) {
        db.insert(table, rowid, values);
    }
}

fn column_row(
    table: i64,
    name: &str,
    data_type: DataType,
    type_code: i64,
    is_hidden: bool,
    expression: Option<&str>,
    storage: Option<i64>,
) -> Vec<SqlValue> {
    vec![
        SqlValue::Null,
        SqlValue::Int(table),
        name.into(),
        SqlValue::Null,
        SqlValue::Int(data_type.code()),
        SqlValue::Null,
        SqlValue::Int(type_code),
        is_hidden.into(),
        expression.into(),
        SqlValue::Null,
        (type_code == 1).then_some(name).into(),
        storage.into(),
    ]
}
