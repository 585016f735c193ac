//! End-to-end loading tests.
//!
//! Packages are assembled by `ModelFixture` and run through the whole
//! pipeline: archive, block codec, container, catalog, columnar decoding.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use semlens_common::types::Decimal;
use semlens_common::{CellValue, DataType, ErrorCode, LensConfig, LensError, WarningScope};
use semlens_model::catalog::{Cardinality, ColumnKind, CrossFilter};
use semlens_model::{DataModel, ModelLoader, Passthrough};
use semlens_test::{
    zip_package, ContainerBuilder, FixtureColumn, FixtureTable, FramedCodec, ModelFixture,
};

fn loader(codec: Arc<FramedCodec>) -> ModelLoader {
    ModelLoader::new(LensConfig::for_testing(), codec).expect("valid config")
}

async fn load(fixture: &ModelFixture) -> DataModel {
    loader(Arc::new(FramedCodec::new()))
        .load(Bytes::from(fixture.package()))
        .await
        .expect("model loads")
}

fn load_blob(fixture: &ModelFixture) -> Result<DataModel, LensError> {
    ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough))
        .expect("valid config")
        .load_blob(Bytes::from(fixture.blob()))
}

fn alice_bob() -> ModelFixture {
    ModelFixture::new().table(
        FixtureTable::new("T")
            .column(FixtureColumn::int("ID", &[1, 2]))
            .column(FixtureColumn::text("Name", &["Alice", "Bob"])),
    )
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_alice_bob() {
    let codec = Arc::new(FramedCodec::new());
    let model = loader(codec.clone())
        .load(Bytes::from(alice_bob().package()))
        .await
        .unwrap();

    assert_eq!(codec.calls(), 1);
    assert_eq!(model.table_names(), vec!["T".to_string()]);
    assert!(model.warnings().is_empty());

    let table = model.table("T").unwrap();
    assert_eq!(table.row_count, 2);
    assert!(table.warnings.is_empty());
    assert_eq!(
        table.column("ID").unwrap().values,
        Some(vec![CellValue::Int64(1), CellValue::Int64(2)])
    );
    assert_eq!(
        table.column("Name").unwrap().values,
        Some(vec![text("Alice"), text("Bob")])
    );
    assert_eq!(
        table.row(1).unwrap(),
        vec![&CellValue::Int64(2), &text("Bob")]
    );

    // Row-number pseudo-columns never surface
    let schema = model.catalog().table("T").unwrap();
    let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ID", "Name"]);
    assert_eq!(schema.row_count, Some(2));
}

#[test]
fn test_indices_reuse_dictionary_entries() {
    let fixture = ModelFixture::new().table(
        FixtureTable::new("T")
            .column(FixtureColumn::int("ID", &[1, 2, 3]))
            .column(FixtureColumn::text("Name", &["Alice", "Bob", "Alice"])),
    );
    let model = load_blob(&fixture).unwrap();
    let table = model.table("T").unwrap();

    assert_eq!(table.row_count, 3);
    assert_eq!(
        table.column("Name").unwrap().values,
        Some(vec![text("Alice"), text("Bob"), text("Alice")])
    );
}

#[tokio::test]
async fn test_load_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.pbix");
    std::fs::write(&path, alice_bob().package()).unwrap();

    let model = loader(Arc::new(FramedCodec::new()))
        .load_path(&path)
        .await
        .unwrap();
    assert_eq!(model.table("T").unwrap().row_count, 2);

    let missing = loader(Arc::new(FramedCodec::new()))
        .load_path(&dir.path().join("absent.pbix"))
        .await
        .unwrap_err();
    assert_eq!(missing.code(), ErrorCode::Io);
}

#[tokio::test]
async fn test_raw_package_with_passthrough() {
    let model = ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough))
        .unwrap()
        .load(Bytes::from(alice_bob().raw_package()))
        .await
        .unwrap();
    assert_eq!(model.table_names(), vec!["T".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_external_command_codec() {
    let codec = semlens_model::ExternalCommand::new("cat");
    let model = ModelLoader::new(LensConfig::for_testing(), Arc::new(codec))
        .unwrap()
        .load(Bytes::from(alice_bob().raw_package()))
        .await
        .unwrap();
    assert_eq!(model.table("T").unwrap().row_count, 2);
}

#[test]
fn test_segments_concatenate_in_order() {
    let ids: Vec<i64> = (1..=10).collect();
    let names = ["a", "b", "c", "a", "b", "c", "a", "b", "c", "d"];
    let fixture = ModelFixture::new().table(
        FixtureTable::new("Orders")
            .column(FixtureColumn::int("ID", &ids).in_segments(3))
            .column(FixtureColumn::text("Code", &names).in_segments(2)),
    );
    let model = load_blob(&fixture).unwrap();
    let table = model.table("Orders").unwrap();

    assert_eq!(table.row_count, 10);
    let expected: Vec<_> = ids.iter().map(|&v| CellValue::Int64(v)).collect();
    assert_eq!(table.column("ID").unwrap().values, Some(expected));
    let expected: Vec<_> = names.iter().map(|&v| text(v)).collect();
    assert_eq!(table.column("Code").unwrap().values, Some(expected));
}

#[test]
fn test_typed_columns_and_nulls() {
    let when = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    let fixture = ModelFixture::new().table(
        FixtureTable::new("Facts")
            .column(FixtureColumn::data(
                "Label",
                DataType::String,
                vec![text("x"), CellValue::Null, text("x")],
            ))
            .column(FixtureColumn::data(
                "Amount",
                DataType::Decimal,
                vec![
                    CellValue::Decimal(Decimal::new(12_345, 4)),
                    CellValue::Decimal(Decimal::new(-500, 4)),
                    CellValue::Null,
                ],
            ))
            .column(FixtureColumn::data(
                "Ratio",
                DataType::Double,
                vec![CellValue::Double(0.5), CellValue::Double(-2.25), CellValue::Double(0.5)],
            ))
            .column(FixtureColumn::data(
                "Flag",
                DataType::Boolean,
                vec![CellValue::Boolean(true), CellValue::Boolean(false), CellValue::Boolean(true)],
            ))
            .column(FixtureColumn::data(
                "When",
                DataType::DateTime,
                vec![CellValue::DateTime(when), CellValue::Null, CellValue::DateTime(when)],
            )),
    );
    let model = load_blob(&fixture).unwrap();
    let table = model.table("Facts").unwrap();

    assert!(table.warnings.is_empty(), "{:?}", table.warnings);
    assert_eq!(table.row_count, 3);
    assert_eq!(
        table.column("Label").unwrap().values,
        Some(vec![text("x"), CellValue::Null, text("x")])
    );
    let amounts = table.column("Amount").unwrap().values.clone().unwrap();
    assert_eq!(amounts[0].to_string(), "1.2345");
    assert_eq!(amounts[1].to_string(), "-0.0500");
    assert!(amounts[2].is_null());
    assert_eq!(table.column("Ratio").unwrap().value(1), Some(&CellValue::Double(-2.25)));
    assert_eq!(table.column("Flag").unwrap().value(1), Some(&CellValue::Boolean(false)));
    assert_eq!(
        table.column("When").unwrap().value(2),
        Some(&CellValue::DateTime(when))
    );
}

#[test]
fn test_formula_column_measure_and_long_text() {
    // Long enough to spill into an overflow chain on 4 KiB pages
    let expression = format!("SUMX(T, {})", "T[ID] + ".repeat(1200));
    let fixture = alice_bob()
        .table(
            FixtureTable::new("Calc")
                .column(FixtureColumn::int("K", &[7]))
                .column(FixtureColumn::calculated("Twice", DataType::Int64, "[K] * 2")),
        )
        .measure("T", "Total", &expression);
    let model = load_blob(&fixture).unwrap();

    let calc = model.table("Calc").unwrap();
    assert_eq!(calc.column("Twice").unwrap().values, None);
    assert_eq!(calc.column("Twice").unwrap().kind, ColumnKind::Calculated);
    assert_eq!(calc.row(0).unwrap(), vec![&CellValue::Int64(7), &CellValue::Null]);

    let schema = model.catalog();
    let twice = schema.table("Calc").unwrap().columns[1].clone();
    assert_eq!(twice.expression.as_deref(), Some("[K] * 2"));
    assert_eq!(schema.measures.len(), 1);
    assert_eq!(schema.measures[0].table, "T");
    assert_eq!(schema.measures[0].expression.as_deref(), Some(expression.as_str()));
}

#[test]
fn test_relationship_and_partition() {
    let fixture = ModelFixture::new()
        .table(
            FixtureTable::new("Sales")
                .column(FixtureColumn::int("DateKey", &[20240101, 20240102]))
                .column(FixtureColumn::int("Qty", &[3, 4])),
        )
        .table(
            FixtureTable::new("Date").column(FixtureColumn::int("DateKey", &[20240101, 20240102])),
        )
        .relationship(("Sales", "DateKey"), ("Date", "DateKey"));
    let model = load_blob(&fixture).unwrap();
    let schema = model.catalog();

    assert_eq!(schema.relationships.len(), 1);
    let rel = &schema.relationships[0];
    assert_eq!((rel.from_table.as_str(), rel.from_column.as_str()), ("Sales", "DateKey"));
    assert_eq!((rel.to_table.as_str(), rel.to_column.as_str()), ("Date", "DateKey"));
    assert_eq!(rel.from_cardinality, Cardinality::Many);
    assert_eq!(rel.to_cardinality, Cardinality::One);
    assert_eq!(rel.cross_filter, CrossFilter::OneDirection);
    assert!(rel.is_active);

    let partitions: Vec<_> = schema.partitions.iter().map(|p| p.table.as_str()).collect();
    assert_eq!(partitions, vec!["Sales", "Date"]);
}

#[test]
fn test_schema_json() {
    let model = load_blob(&alice_bob()).unwrap();
    let json = serde_json::to_value(model.catalog()).unwrap();
    assert_eq!(json["tables"][0]["name"], "T");
    assert_eq!(json["tables"][0]["columns"][1]["name"], "Name");
    assert_eq!(json["tables"][0]["columns"][1]["dataType"], "string");
    assert_eq!(json["tables"][0]["columns"][1]["kind"], "data");
}

#[test]
fn test_small_pages_build_deeper_trees() {
    let mut table = FixtureTable::new("Wide");
    for i in 0..40 {
        table = table.column(FixtureColumn::int(&format!("C{i}"), &[i, i + 1]));
    }
    let fixture = ModelFixture::new().table(table).with_page_size(512);
    let model = load_blob(&fixture).unwrap();
    let wide = model.table("Wide").unwrap();

    assert_eq!(wide.columns.len(), 40);
    assert_eq!(wide.column("C39").unwrap().value(1), Some(&CellValue::Int64(40)));
    assert!(model.warnings().is_empty());
}

#[test]
fn test_table_cache_and_materialize_all() {
    let fixture = alice_bob().table(FixtureTable::new("U").column(FixtureColumn::int("X", &[1])));
    let model = load_blob(&fixture).unwrap();
    assert_eq!(model.cached_tables(), 0);

    let first = model.table("T").unwrap();
    let second = model.table("T").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(model.cached_tables(), 1);

    let all = model.materialize_all().unwrap();
    let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["T", "U"]);
    assert!(Arc::ptr_eq(&all[0], &first));
    assert_eq!(model.cached_tables(), 2);
}

// =============================================================================
// System Objects
// =============================================================================

#[test]
fn test_system_tables_are_filtered() {
    let fixture = ModelFixture::new()
        .table(FixtureTable::new("Sales").column(FixtureColumn::int("DateKey", &[1])))
        .table(
            FixtureTable::new("H$Sales (12)$DateKey")
                .column(FixtureColumn::int("POS_TO_ID", &[0])),
        )
        .table(FixtureTable::new("LocalDateTable_abc").column(FixtureColumn::int("DateKey", &[1])))
        .relationship(("Sales", "DateKey"), ("LocalDateTable_abc", "DateKey"))
        .measure("LocalDateTable_abc", "Hidden", "1");
    let model = load_blob(&fixture).unwrap();

    assert_eq!(model.table_names(), vec!["Sales".to_string()]);
    assert_eq!(model.catalog().tables.len(), 1);
    assert!(model.catalog().relationships.is_empty());
    assert!(model.catalog().measures.is_empty());
    assert!(model.catalog().partitions.iter().all(|p| p.table == "Sales"));
    assert_eq!(model.graph().tables.len(), 3);

    let err = model.table("LocalDateTable_abc").unwrap_err();
    assert_eq!(err.code(), ErrorCode::TableNotFound);
    assert!(!err.is_fatal());
}

#[test]
fn test_unknown_table() {
    let model = load_blob(&alice_bob()).unwrap();
    let err = model.table("Nope").unwrap_err();
    assert!(matches!(err, LensError::TableNotFound { ref table } if table == "Nope"));
}

// =============================================================================
// Contained Failures
// =============================================================================

#[test]
fn test_missing_dictionary_storage() {
    let model = load_blob(&alice_bob().without_dictionary_storage("T", "Name")).unwrap();

    // Reported at load time against the column
    assert!(model.warnings().iter().any(|w| w.is_for_column("T", "Name")
        && w.code == ErrorCode::CatalogConsistency));

    let table = model.table("T").unwrap();
    assert_eq!(table.row_count, 2);
    assert_eq!(
        table.column("ID").unwrap().values,
        Some(vec![CellValue::Int64(1), CellValue::Int64(2)])
    );
    assert_eq!(
        table.column("Name").unwrap().values,
        Some(vec![CellValue::Null, CellValue::Null])
    );
    assert_eq!(table.warnings.len(), 1);
    assert!(table.warnings[0].is_for_column("T", "Name"));
    assert_eq!(table.warnings[0].code, ErrorCode::CatalogConsistency);
}

#[test]
fn test_truncated_dictionary_is_contained() {
    let model = load_blob(&alice_bob().truncate_dictionary("T", "Name")).unwrap();
    let table = model.table("T").unwrap();

    assert_eq!(table.row_count, 2);
    assert_eq!(table.warnings.len(), 1);
    assert_eq!(table.warnings[0].code, ErrorCode::DictionaryDecode);
    assert_eq!(
        table.column("Name").unwrap().values,
        Some(vec![CellValue::Null, CellValue::Null])
    );
    assert!(table.column("ID").unwrap().value(0).is_some_and(|v| !v.is_null()));
}

#[test]
fn test_optional_catalog_tables_absent() {
    let fixture = alice_bob()
        .measure("T", "M", "1")
        .omit_catalog_table("Measure")
        .omit_catalog_table("Relationship")
        .omit_catalog_table("Partition");
    let model = load_blob(&fixture).unwrap();

    assert!(model.catalog().measures.is_empty());
    assert!(model.catalog().relationships.is_empty());
    assert!(model.catalog().partitions.is_empty());
    assert_eq!(model.table("T").unwrap().row_count, 2);
}

// =============================================================================
// Fatal Failures
// =============================================================================

#[tokio::test]
async fn test_truncated_blob_fails_in_decompression() {
    let framed = FramedCodec::compress(&alice_bob().blob());
    let truncated = &framed[..framed.len() - 10];
    let package = zip_package(&[("DataModel", truncated)]);

    let codec = Arc::new(FramedCodec::new());
    let err = loader(codec.clone())
        .load(Bytes::from(package))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Decompression);
    assert!(err.is_fatal());
    assert!(!err.is_retryable());
    assert!(err.to_string().starts_with("corrupt compressed stream"));
    assert_eq!(codec.calls(), 1);
}

#[tokio::test]
async fn test_missing_model_entry() {
    let package = zip_package(&[("Version", b"1.28".as_slice())]);
    let err = loader(Arc::new(FramedCodec::new()))
        .load(Bytes::from(package))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Archive);
}

#[tokio::test]
async fn test_blob_over_limit() {
    let config = LensConfig::for_testing().with_max_blob_bytes(64);
    let err = ModelLoader::new(config, Arc::new(FramedCodec::new()))
        .unwrap()
        .load(Bytes::from(alice_bob().package()))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_missing_required_catalog_table() {
    let err = load_blob(&alice_bob().omit_catalog_table("StorageFile")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CatalogConsistency);
    assert!(err.to_string().contains("StorageFile"));
}

#[test]
fn test_bad_container_magic() {
    let loader = ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough)).unwrap();
    let err = loader.load_blob(Bytes::from(vec![0u8; 200])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadMagic);
}

#[test]
fn test_missing_catalog_slice() {
    let blob = ContainerBuilder::new().slice("other.bin", b"abc".to_vec()).build();
    let loader = ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough)).unwrap();
    let err = loader.load_blob(Bytes::from(blob)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedDirectory);
}

#[test]
fn test_corrupt_catalog_page_is_fatal() {
    let (db, mut container) = alice_bob().assemble();
    let mut catalog = db.build();
    // Page 1 type byte follows the 100-byte database header
    catalog[100] = 0x07;
    container.add("metadata.sqlitedb", catalog);

    let loader = ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough)).unwrap();
    let err = loader.load_blob(Bytes::from(container.build())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PageFormat);
    assert!(err.is_fatal());
}

#[test]
fn test_column_scoped_warning_names_column() {
    let model = load_blob(&alice_bob().without_dictionary_storage("T", "Name")).unwrap();
    let warning = model
        .warnings()
        .iter()
        .find(|w| matches!(w.scope, WarningScope::Column { .. }))
        .unwrap();
    assert_eq!(warning.scope.table(), Some("T"));
    assert!(warning.to_string().starts_with("column 'T'[Name]"));
}
