//! Property tests for the format round-trips the decoder relies on.

use std::sync::Arc;

use bytes::Bytes;
use proptest::prelude::*;
use semlens_common::{CellValue, DataType, LensConfig};
use semlens_model::vertipaq::{ColumnDictionary, DecodeSettings, PackedIndexArray};
use semlens_model::{ModelLoader, Passthrough};
use semlens_storage::{DirectoryContainer, PageEngine};
use semlens_test::{
    encode_dictionary, pack_indices, CatalogDbBuilder, ContainerBuilder, DictionaryLayout,
    FixtureColumn, FixtureTable, ModelFixture, SqlValue,
};

fn ascii_text(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(0x20u8..0x7f, 0..max_len)
        .prop_map(|bytes| String::from_utf8(bytes).expect("printable ascii"))
}

fn page_size() -> impl Strategy<Value = usize> {
    prop_oneof![Just(512usize), Just(1024), Just(4096)]
}

// =============================================================================
// Directory Container
// =============================================================================

proptest! {
    #[test]
    fn prop_container_slices_round_trip(
        slices in prop::collection::btree_map(
            "[A-Za-z0-9 ()._]{1,24}",
            prop::collection::vec(any::<u8>(), 0..256),
            0..12,
        )
    ) {
        let mut builder = ContainerBuilder::new();
        for (name, data) in &slices {
            builder.add(name.clone(), data.clone());
        }
        let container = DirectoryContainer::parse(Bytes::from(builder.build())).unwrap();

        prop_assert_eq!(container.slices().len(), slices.len());
        for (name, data) in &slices {
            let slice = container.slice(name).unwrap();
            prop_assert_eq!(&slice[..], &data[..]);
        }
    }
}

// =============================================================================
// Catalog Pages
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_overflow_chains_reassemble(
        page_size in page_size(),
        values in prop::collection::vec(ascii_text(20_000), 1..5),
    ) {
        let mut builder = CatalogDbBuilder::new().with_page_size(page_size);
        builder.create_table("T", "CREATE TABLE T (v TEXT)");
        for (i, value) in values.iter().enumerate() {
            builder.insert("T", i as i64 + 1, vec![SqlValue::from(value.as_str())]);
        }

        let engine = PageEngine::open(Bytes::from(builder.build())).unwrap();
        let scan = engine.read_table(2).unwrap();

        prop_assert!(scan.rejected.is_empty());
        prop_assert_eq!(scan.rows.len(), values.len());
        for (row, value) in scan.rows.iter().zip(&values) {
            prop_assert_eq!(row.value(0).and_then(|v| v.as_str()), Some(value.as_str()));
        }
    }

    #[test]
    fn prop_many_rows_keep_key_order(
        page_size in page_size(),
        values in prop::collection::vec(ascii_text(200), 1..300),
    ) {
        let mut builder = CatalogDbBuilder::new().with_page_size(page_size);
        builder.create_table("T", "CREATE TABLE T (v TEXT)");
        for (i, value) in values.iter().enumerate() {
            builder.insert("T", (i as i64 + 1) * 10, vec![SqlValue::from(value.as_str())]);
        }

        let engine = PageEngine::open(Bytes::from(builder.build())).unwrap();
        let scan = engine.read_table(2).unwrap();

        let rowids: Vec<i64> = scan.rows.iter().map(|r| r.rowid).collect();
        let expected: Vec<i64> = (1..=values.len() as i64).map(|i| i * 10).collect();
        prop_assert_eq!(rowids, expected);
    }
}

// =============================================================================
// Dictionary And Index
// =============================================================================

fn pooled_values() -> impl Strategy<Value = Vec<CellValue>> {
    let pool = prop::collection::vec(
        prop_oneof![
            1 => Just(CellValue::Null),
            4 => "[a-z]{0,6}".prop_map(CellValue::Text),
        ],
        1..6,
    );
    pool.prop_flat_map(|pool| {
        let len = pool.len();
        prop::collection::vec(0..len, 1..60)
            .prop_map(move |picks| picks.into_iter().map(|i| pool[i].clone()).collect())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_materialized_values_match_inputs(values in pooled_values()) {
        let fixture = ModelFixture::new().table(
            FixtureTable::new("T")
                .column(FixtureColumn::data("V", DataType::String, values.clone()).in_segments(2)),
        );
        let model = ModelLoader::new(LensConfig::for_testing(), Arc::new(Passthrough))
            .unwrap()
            .load_blob(Bytes::from(fixture.blob()))
            .unwrap();
        let table = model.table("T").unwrap();

        prop_assert!(table.warnings.is_empty());
        prop_assert_eq!(table.row_count, values.len());
        prop_assert_eq!(table.column("V").unwrap().values.clone(), Some(values));
    }

    #[test]
    fn prop_index_resolves_through_dictionary(
        entries in prop::collection::btree_set(any::<i64>(), 1..40),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..200),
    ) {
        let entries: Vec<CellValue> = entries.into_iter().map(CellValue::Int64).collect();
        let indices: Vec<u32> = picks.iter().map(|p| p.index(entries.len()) as u32).collect();

        let settings = DecodeSettings::from_config(&LensConfig::for_testing().decode).unwrap();
        let dictionary = ColumnDictionary::decode(
            "d",
            &encode_dictionary(&entries, DictionaryLayout::default()),
            DataType::Int64,
            &settings,
        )
        .unwrap();
        let packed = PackedIndexArray::parse(
            "i",
            Bytes::from(pack_indices(&indices, entries.len())),
        )
        .unwrap();

        prop_assert_eq!(packed.len(), indices.len());
        for (row, &index) in indices.iter().enumerate() {
            let position = packed.get(row).unwrap();
            prop_assert_eq!(position, index);
            prop_assert_eq!(dictionary.get(position), Some(&entries[index as usize]));
        }
    }
}

#[test]
fn test_wide_dictionary_uses_wider_indices() {
    let indices: Vec<u32> = (0..300).rev().collect();
    let bytes = pack_indices(&indices, 300);
    let packed = PackedIndexArray::parse("i", Bytes::from(bytes)).unwrap();

    assert_eq!(packed.bit_width(), 9);
    assert_eq!(packed.get(0), Some(299));
    assert_eq!(packed.get(299), Some(0));
    assert_eq!(packed.get(300), None);
}
