//! Bit-packed index arrays.
//!
//! # Slice Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       1   bit_width (1..=32)
//!   1       3   reserved
//!   4       4   row_count (LE)
//!   8       …   packed indices, ceil(row_count * bit_width / 8) bytes
//! ```
//!
//! Indices are packed least-significant bit first: row `i` occupies bits
//! `i * w .. (i + 1) * w` of the little-endian bit stream, so an index can
//! straddle a byte boundary.

use bytes::Bytes;
use semlens_common::constants::{MAX_INDEX_BIT_WIDTH, PACKED_INDEX_HEADER_SIZE};
use semlens_common::{LensError, LensResult};

/// Returns the narrowest width that addresses `size` dictionary positions.
///
/// Never less than one bit.
pub fn bit_width_for(size: usize) -> u8 {
    if size <= 2 {
        return 1;
    }
    let bits = usize::BITS - (size - 1).leading_zeros();
    // At most usize::BITS, which fits
    bits as u8
}

/// Packs indices at a fixed width, header included.
///
/// Returns `None` if the width is outside `1..=32` or an index does not fit.
pub fn encode_packed(indices: &[u32], bit_width: u8) -> Option<Vec<u8>> {
    if bit_width == 0 || bit_width > MAX_INDEX_BIT_WIDTH {
        return None;
    }
    let width = u64::from(bit_width);
    if bit_width < 32 && indices.iter().any(|&v| u64::from(v) >> width != 0) {
        return None;
    }
    let row_count = u32::try_from(indices.len()).ok()?;
    let body_len = packed_len(indices.len() as u64, bit_width)?;

    let mut out = Vec::with_capacity(PACKED_INDEX_HEADER_SIZE + body_len);
    out.extend_from_slice(&[bit_width, 0, 0, 0]);
    out.extend_from_slice(&row_count.to_le_bytes());

    let mut body = vec![0u8; body_len];
    for (row, &value) in indices.iter().enumerate() {
        let bit_pos = row as u64 * width;
        let start = (bit_pos / 8) as usize;
        let shifted = u64::from(value) << (bit_pos % 8);
        for (k, byte) in body.iter_mut().skip(start).take(8).enumerate() {
            *byte |= (shifted >> (8 * k)) as u8;
        }
    }
    out.extend_from_slice(&body);
    Some(out)
}

fn packed_len(rows: u64, bit_width: u8) -> Option<usize> {
    let bits = rows.checked_mul(u64::from(bit_width))?;
    usize::try_from(bits.div_ceil(8)).ok()
}

/// A parsed packed index array.
#[derive(Debug, Clone)]
pub struct PackedIndexArray {
    bit_width: u8,
    row_count: usize,
    data: Bytes,
}

impl PackedIndexArray {
    /// Parses a packed index slice.
    ///
    /// # Errors
    ///
    /// Returns `PackedIndexDecode` if the header is truncated, the width is
    /// outside `1..=32`, or the body is shorter than the row count needs.
    pub fn parse(slice: &str, data: Bytes) -> LensResult<Self> {
        if data.len() < PACKED_INDEX_HEADER_SIZE {
            return Err(LensError::packed_index(
                slice,
                format!("header needs {PACKED_INDEX_HEADER_SIZE} bytes, have {}", data.len()),
            ));
        }
        let bit_width = data[0];
        if bit_width == 0 || bit_width > MAX_INDEX_BIT_WIDTH {
            return Err(LensError::packed_index(
                slice,
                format!("bit width {bit_width} outside 1..={MAX_INDEX_BIT_WIDTH}"),
            ));
        }
        let row_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

        let body = data.slice(PACKED_INDEX_HEADER_SIZE..);
        let needed = packed_len(row_count as u64, bit_width).ok_or_else(|| {
            LensError::packed_index(slice, format!("row count {row_count} overflows"))
        })?;
        if body.len() < needed {
            return Err(LensError::packed_index(
                slice,
                format!(
                    "{row_count} rows at {bit_width} bits need {needed} bytes, have {}",
                    body.len()
                ),
            ));
        }

        Ok(Self {
            bit_width,
            row_count,
            data: body,
        })
    }

    /// Returns the index width in bits.
    #[inline]
    pub fn bit_width(&self) -> u8 {
        self.bit_width
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.row_count
    }

    /// Returns true if the array holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns the index stored for a row.
    pub fn get(&self, row: usize) -> Option<u32> {
        if row >= self.row_count {
            return None;
        }
        let bit_pos = row as u64 * u64::from(self.bit_width);
        let start = (bit_pos / 8) as usize;
        let end = (start + 8).min(self.data.len());

        let mut window = [0u8; 8];
        window[..end - start].copy_from_slice(&self.data[start..end]);
        let word = u64::from_le_bytes(window) >> (bit_pos % 8);
        let mask = (1u64 << self.bit_width) - 1;
        Some((word & mask) as u32)
    }

    /// Iterates the indices in row order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.row_count).filter_map(move |row| self.get(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bit_width_for() {
        assert_eq!(bit_width_for(0), 1);
        assert_eq!(bit_width_for(1), 1);
        assert_eq!(bit_width_for(2), 1);
        assert_eq!(bit_width_for(3), 2);
        assert_eq!(bit_width_for(4), 2);
        assert_eq!(bit_width_for(5), 3);
        assert_eq!(bit_width_for(256), 8);
        assert_eq!(bit_width_for(257), 9);
    }

    #[test]
    fn test_known_vector() {
        // 1,2,3,4,5 at three bits, LSB first
        let bytes = encode_packed(&[1, 2, 3, 4, 5], 3).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, 5, 0, 0, 0, 0xD1, 0x58]);

        let array = PackedIndexArray::parse("idx", Bytes::from(bytes)).unwrap();
        assert_eq!(array.bit_width(), 3);
        assert_eq!(array.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(array.get(5), None);
    }

    #[test]
    fn test_straddling_index() {
        // Row 1 at width 5 spans bits 5..10
        let body = [0b1110_0000u8, 0b0000_0011];
        let mut data = vec![5, 0, 0, 0, 2, 0, 0, 0];
        data.extend_from_slice(&body);
        let array = PackedIndexArray::parse("idx", Bytes::from(data)).unwrap();
        assert_eq!(array.get(0), Some(0));
        assert_eq!(array.get(1), Some(0b11111));
    }

    #[test]
    fn test_full_width() {
        let bytes = encode_packed(&[u32::MAX, 0, 7], 32).unwrap();
        let array = PackedIndexArray::parse("idx", Bytes::from(bytes)).unwrap();
        assert_eq!(array.iter().collect::<Vec<_>>(), vec![u32::MAX, 0, 7]);
    }

    #[test]
    fn test_rejects_bad_width() {
        let data = Bytes::from_static(&[0, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert!(PackedIndexArray::parse("idx", data).is_err());
        let data = Bytes::from_static(&[33, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(PackedIndexArray::parse("idx", data).is_err());
        assert!(encode_packed(&[1], 0).is_none());
        assert!(encode_packed(&[4], 2).is_none());
    }

    #[test]
    fn test_rejects_short_body() {
        // 9 rows at 8 bits need 9 bytes
        let mut data = vec![8, 0, 0, 0, 9, 0, 0, 0];
        data.extend_from_slice(&[0; 8]);
        let err = PackedIndexArray::parse("Sales.idx", Bytes::from(data)).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Sales.idx"));
    }

    #[test]
    fn test_empty_array() {
        let bytes = encode_packed(&[], 4).unwrap();
        let array = PackedIndexArray::parse("idx", Bytes::from(bytes)).unwrap();
        assert!(array.is_empty());
        assert_eq!(array.iter().count(), 0);
    }

    fn width_and_values() -> impl Strategy<Value = (u8, Vec<u32>)> {
        (1u8..=32).prop_flat_map(|width| {
            let max = if width == 32 {
                u32::MAX
            } else {
                (1u32 << width) - 1
            };
            (Just(width), prop::collection::vec(0..=max, 0..200))
        })
    }

    proptest! {
        #[test]
        fn prop_pack_unpack((width, values) in width_and_values()) {
            let bytes = encode_packed(&values, width).unwrap();
            prop_assert_eq!(
                bytes.len(),
                PACKED_INDEX_HEADER_SIZE + (values.len() * width as usize).div_ceil(8)
            );
            let array = PackedIndexArray::parse("idx", Bytes::from(bytes)).unwrap();
            prop_assert_eq!(array.iter().collect::<Vec<_>>(), values);
        }
    }
}
