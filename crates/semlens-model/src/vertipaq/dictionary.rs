//! Column dictionaries.
//!
//! A dictionary holds the distinct values of one column; the packed index
//! array stores positions into it.
//!
//! # Slice Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       4   entry_count (LE, stored values only)
//!   4       1   flags: bit 0 null sentinel, bit 1 big-endian values
//!   5       3   reserved
//!   8       …   entries
//! ```
//!
//! Entries by declared column type:
//!
//! | Type              | Entry                                        |
//! |-------------------|----------------------------------------------|
//! | String, Binary    | u32 length + bytes (String must be UTF-8)    |
//! | Int64             | i64                                          |
//! | Double            | f64                                          |
//! | Boolean           | u8, 0 is false                               |
//! | Decimal           | i64 mantissa, scaled by the decimal scale    |
//! | DateTime          | i64 ticks since the epoch                    |
//!
//! With the null-sentinel flag, position 0 is a blank that is not stored
//! and the first stored entry is position 1.

use chrono::{NaiveDateTime, TimeDelta};
use semlens_common::config::DecodeConfig;
use semlens_common::constants::DICTIONARY_HEADER_SIZE;
use semlens_common::types::Decimal;
use semlens_common::{CellValue, DataType, LensError, LensResult};
use semlens_storage::reader::ByteCursor;

/// Decoding constants for numeric and date/time entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSettings {
    /// Power-of-ten scale of decimal mantissas.
    pub decimal_scale: u32,
    /// Zero point of date/time tick counts.
    pub epoch: NaiveDateTime,
    /// Tick resolution.
    pub ticks_per_second: u64,
}

impl DecodeSettings {
    /// Builds settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the epoch does not parse, the tick
    /// resolution is zero, or the decimal scale exceeds 18.
    pub fn from_config(config: &DecodeConfig) -> LensResult<Self> {
        if config.ticks_per_second == 0 {
            return Err(LensError::invalid_config(
                "decode.ticks_per_second must be positive",
            ));
        }
        if config.decimal_scale > 18 {
            return Err(LensError::invalid_config(
                "decode.decimal_scale must be at most 18",
            ));
        }
        Ok(Self {
            decimal_scale: config.decimal_scale,
            epoch: config.epoch()?,
            ticks_per_second: config.ticks_per_second,
        })
    }

    /// Converts a tick count to a date/time, or `None` if out of range.
    pub fn ticks_to_datetime(&self, ticks: i64) -> Option<NaiveDateTime> {
        let per_second = i64::try_from(self.ticks_per_second).ok()?;
        let seconds = ticks.div_euclid(per_second);
        let sub_ticks = ticks.rem_euclid(per_second);
        let nanos = i128::from(sub_ticks) * 1_000_000_000 / i128::from(per_second);
        let nanos = i64::try_from(nanos).ok()?;
        self.epoch
            .checked_add_signed(TimeDelta::try_seconds(seconds)?)?
            .checked_add_signed(TimeDelta::nanoseconds(nanos))
    }
}

/// Decoded dictionary of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDictionary {
    values: Vec<CellValue>,
    has_null_sentinel: bool,
}

impl ColumnDictionary {
    /// Flag bit: position 0 is an implicit blank.
    pub const FLAG_NULL_SENTINEL: u8 = 0x01;
    /// Flag bit: entries are big-endian.
    pub const FLAG_BIG_ENDIAN: u8 = 0x02;

    /// Decodes a dictionary slice.
    ///
    /// # Errors
    ///
    /// Returns `DictionaryDecode` if the slice is truncated, a string is
    /// not UTF-8, a value is out of range, or the column type has no
    /// dictionary encoding.
    pub fn decode(
        slice: &str,
        data: &[u8],
        data_type: DataType,
        settings: &DecodeSettings,
    ) -> LensResult<Self> {
        let err = |reason: String| LensError::dictionary(slice, reason);

        let mut cursor = ByteCursor::new(data);
        let entry_count = cursor
            .read_u32_le()
            .map_err(|e| err(format!("truncated header: {e}")))?;
        let flags = cursor
            .read_u8()
            .map_err(|e| err(format!("truncated header: {e}")))?;
        cursor
            .skip(DICTIONARY_HEADER_SIZE - 5)
            .map_err(|e| err(format!("truncated header: {e}")))?;

        let has_null_sentinel = flags & Self::FLAG_NULL_SENTINEL != 0;
        let big_endian = flags & Self::FLAG_BIG_ENDIAN != 0;

        if data_type == DataType::Unknown {
            return Err(err("column has no decodable data type".to_string()));
        }

        // Every entry takes at least one byte
        let count = entry_count as usize;
        if count > cursor.remaining() {
            return Err(err(format!(
                "{entry_count} entries declared but only {} bytes follow",
                cursor.remaining()
            )));
        }

        let mut values = Vec::with_capacity(count + usize::from(has_null_sentinel));
        if has_null_sentinel {
            values.push(CellValue::Null);
        }

        for index in 0..count {
            let entry_err =
                |reason: String| err(format!("entry {index}: {reason}"));
            let value = match data_type {
                DataType::String | DataType::Binary => {
                    let len = cursor
                        .read_u32(big_endian)
                        .map_err(|e| entry_err(e.to_string()))?;
                    let bytes = cursor
                        .read_bytes(len as usize)
                        .map_err(|e| entry_err(e.to_string()))?;
                    if data_type == DataType::String {
                        let text = std::str::from_utf8(bytes)
                            .map_err(|_| entry_err("invalid UTF-8".to_string()))?;
                        CellValue::Text(text.to_string())
                    } else {
                        CellValue::Binary(bytes.to_vec())
                    }
                }
                DataType::Int64 => CellValue::Int64(
                    cursor
                        .read_i64(big_endian)
                        .map_err(|e| entry_err(e.to_string()))?,
                ),
                DataType::Double => CellValue::Double(
                    cursor
                        .read_f64(big_endian)
                        .map_err(|e| entry_err(e.to_string()))?,
                ),
                DataType::Boolean => CellValue::Boolean(
                    cursor.read_u8().map_err(|e| entry_err(e.to_string()))? != 0,
                ),
                DataType::Decimal => {
                    let mantissa = cursor
                        .read_i64(big_endian)
                        .map_err(|e| entry_err(e.to_string()))?;
                    CellValue::Decimal(Decimal::new(mantissa, settings.decimal_scale))
                }
                DataType::DateTime => {
                    let ticks = cursor
                        .read_i64(big_endian)
                        .map_err(|e| entry_err(e.to_string()))?;
                    let value = settings
                        .ticks_to_datetime(ticks)
                        .ok_or_else(|| entry_err(format!("tick count {ticks} out of range")))?;
                    CellValue::DateTime(value)
                }
                DataType::Unknown => {
                    return Err(err("column has no decodable data type".to_string()));
                }
            };
            values.push(value);
        }

        Ok(Self {
            values,
            has_null_sentinel,
        })
    }

    /// Returns the number of addressable positions, sentinel included.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no position is addressable.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if position 0 is the blank sentinel.
    #[inline]
    pub fn has_null_sentinel(&self) -> bool {
        self.has_null_sentinel
    }

    /// Returns the value at a dictionary position.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&CellValue> {
        self.values.get(index as usize)
    }

    /// Returns all positions in order.
    #[inline]
    pub fn values(&self) -> &[CellValue] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DecodeSettings {
        DecodeSettings::from_config(&DecodeConfig::default()).unwrap()
    }

    fn header(count: u32, flags: u8) -> Vec<u8> {
        let mut out = count.to_le_bytes().to_vec();
        out.extend_from_slice(&[flags, 0, 0, 0]);
        out
    }

    fn strings(flags: u8, values: &[&str]) -> Vec<u8> {
        let mut out = header(values.len() as u32, flags);
        for v in values {
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
        out
    }

    #[test]
    fn test_string_dictionary() {
        let dict = ColumnDictionary::decode(
            "d",
            &strings(0, &["Alice", "Bob"]),
            DataType::String,
            &settings(),
        )
        .unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(0), Some(&CellValue::Text("Alice".into())));
        assert_eq!(dict.get(2), None);
    }

    #[test]
    fn test_null_sentinel() {
        let dict = ColumnDictionary::decode(
            "d",
            &strings(ColumnDictionary::FLAG_NULL_SENTINEL, &["x"]),
            DataType::String,
            &settings(),
        )
        .unwrap();
        assert!(dict.has_null_sentinel());
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(0), Some(&CellValue::Null));
        assert_eq!(dict.get(1), Some(&CellValue::Text("x".into())));
    }

    #[test]
    fn test_big_endian_ints() {
        let mut data = header(2, ColumnDictionary::FLAG_BIG_ENDIAN);
        data.extend_from_slice(&7i64.to_be_bytes());
        data.extend_from_slice(&(-1i64).to_be_bytes());
        let dict = ColumnDictionary::decode("d", &data, DataType::Int64, &settings()).unwrap();
        assert_eq!(dict.values(), &[CellValue::Int64(7), CellValue::Int64(-1)]);
    }

    #[test]
    fn test_decimal_and_boolean() {
        let mut data = header(1, 0);
        data.extend_from_slice(&12_345i64.to_le_bytes());
        let dict = ColumnDictionary::decode("d", &data, DataType::Decimal, &settings()).unwrap();
        assert_eq!(dict.get(0).unwrap().to_string(), "1.2345");

        let mut data = header(2, 0);
        data.extend_from_slice(&[0, 1]);
        let dict = ColumnDictionary::decode("d", &data, DataType::Boolean, &settings()).unwrap();
        assert_eq!(
            dict.values(),
            &[CellValue::Boolean(false), CellValue::Boolean(true)]
        );
    }

    #[test]
    fn test_datetime_ticks() {
        let one_day: i64 = 86_400 * 10_000_000;
        let mut data = header(2, 0);
        data.extend_from_slice(&one_day.to_le_bytes());
        data.extend_from_slice(&(-5_000_000i64).to_le_bytes());
        let dict = ColumnDictionary::decode("d", &data, DataType::DateTime, &settings()).unwrap();
        assert_eq!(dict.get(0).unwrap().to_string(), "1899-12-31 00:00:00");
        // Half a second before the epoch
        match dict.get(1).unwrap() {
            CellValue::DateTime(dt) => {
                assert_eq!(dt.to_string(), "1899-12-29 23:59:59.500");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_truncated_entry() {
        let mut data = strings(0, &["Alice"]);
        data.truncate(data.len() - 2);
        // Claim the single entry is there; its bytes are not
        let err = ColumnDictionary::decode("Sales.dict", &data, DataType::String, &settings())
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Sales.dict"));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut data = header(1, 0);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(0xFF);
        assert!(ColumnDictionary::decode("d", &data, DataType::String, &settings()).is_err());
        // The same bytes are a valid binary dictionary
        let dict = ColumnDictionary::decode("d", &data, DataType::Binary, &settings()).unwrap();
        assert_eq!(dict.get(0), Some(&CellValue::Binary(vec![0xFF])));
    }

    #[test]
    fn test_overlong_count() {
        let data = header(1000, 0);
        assert!(ColumnDictionary::decode("d", &data, DataType::Int64, &settings()).is_err());
    }

    #[test]
    fn test_unknown_type() {
        let data = header(0, 0);
        assert!(ColumnDictionary::decode("d", &data, DataType::Unknown, &settings()).is_err());
    }
}
