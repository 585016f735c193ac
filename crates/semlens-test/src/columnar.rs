//! Dictionary and packed-index slice encoders.

use chrono::NaiveDateTime;
use semlens_common::constants::DEFAULT_TICKS_PER_SECOND;
use semlens_common::CellValue;
use semlens_model::vertipaq::{bit_width_for, encode_packed, ColumnDictionary};

/// Dictionary header options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictionaryLayout {
    /// Position 0 is an implicit blank.
    pub null_sentinel: bool,
    /// Entries are big-endian.
    pub big_endian: bool,
}

impl DictionaryLayout {
    /// Layout with a null sentinel.
    pub fn with_sentinel() -> Self {
        Self {
            null_sentinel: true,
            big_endian: false,
        }
    }
}

/// Returns the default date/time epoch.
pub fn default_epoch() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid epoch")
}

/// Converts a date/time to ticks since the default epoch.
pub fn datetime_ticks(value: NaiveDateTime) -> i64 {
    let delta = value - default_epoch();
    let per_second = DEFAULT_TICKS_PER_SECOND as i64;
    delta.num_seconds() * per_second
        + i64::from(delta.subsec_nanos()) / (1_000_000_000 / per_second)
}

/// Encodes a dictionary slice holding `values` as its stored entries.
///
/// # Panics
///
/// Panics on `CellValue::Null`, which only the sentinel represents.
pub fn encode_dictionary(values: &[CellValue], layout: DictionaryLayout) -> Vec<u8> {
    let mut flags = 0;
    if layout.null_sentinel {
        flags |= ColumnDictionary::FLAG_NULL_SENTINEL;
    }
    if layout.big_endian {
        flags |= ColumnDictionary::FLAG_BIG_ENDIAN;
    }

    let mut out = (values.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(&[flags, 0, 0, 0]);

    let be = layout.big_endian;
    let u32_bytes = |v: u32| if be { v.to_be_bytes() } else { v.to_le_bytes() };
    let i64_bytes = |v: i64| if be { v.to_be_bytes() } else { v.to_le_bytes() };

    for value in values {
        match value {
            CellValue::Null => panic!("null is only representable as the sentinel"),
            CellValue::Text(s) => {
                out.extend_from_slice(&u32_bytes(s.len() as u32));
                out.extend_from_slice(s.as_bytes());
            }
            CellValue::Binary(b) => {
                out.extend_from_slice(&u32_bytes(b.len() as u32));
                out.extend_from_slice(b);
            }
            CellValue::Int64(v) => out.extend_from_slice(&i64_bytes(*v)),
            CellValue::Double(v) => {
                let bytes = if be { v.to_be_bytes() } else { v.to_le_bytes() };
                out.extend_from_slice(&bytes);
            }
            CellValue::Boolean(v) => out.push(u8::from(*v)),
            CellValue::Decimal(d) => out.extend_from_slice(&i64_bytes(d.mantissa)),
            CellValue::DateTime(dt) => out.extend_from_slice(&i64_bytes(datetime_ticks(*dt))),
        }
    }
    out
}

/// Packs indices at the narrowest width for a dictionary of
/// `dictionary_size` positions.
///
/// # Panics
///
/// Panics if an index does not fit that width.
pub fn pack_indices(indices: &[u32], dictionary_size: usize) -> Vec<u8> {
    let width = bit_width_for(dictionary_size);
    encode_packed(indices, width).expect("indices fit the dictionary width")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_ticks() {
        let dt = default_epoch() + chrono::TimeDelta::try_days(1).unwrap();
        assert_eq!(datetime_ticks(dt), 864_000_000_000);
        assert_eq!(datetime_ticks(default_epoch()), 0);
    }

    #[test]
    fn test_dictionary_header() {
        let bytes = encode_dictionary(
            &[CellValue::Int64(1)],
            DictionaryLayout {
                null_sentinel: true,
                big_endian: true,
            },
        );
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(&bytes[8..], &1i64.to_be_bytes());
    }
}
