//! Table B-tree cells.
//!
//! # Leaf Cell
//!
//! ```text
//! varint   payload length (P)
//! varint   rowid
//! L bytes  local payload
//! u32 BE   first overflow page (only when L < P)
//! ```
//!
//! # Interior Cell
//!
//! ```text
//! u32 BE   left child page
//! varint   rowid (largest key in the left subtree)
//! ```
//!
//! The local size `L` follows the database's spill rule: with usable size
//! `U`, `max_local = U - 35` and `min_local = (U - 12) * 32 / 255 - 23`.
//! Payloads up to `max_local` are stored whole. Larger ones keep
//! `min_local + (P - min_local) % (U - 4)` bytes locally when that does not
//! exceed `max_local`, and `min_local` bytes otherwise.

use semlens_common::{LensError, LensResult};

use super::varint::decode_varint;

/// Largest payload stored entirely on a table leaf page.
#[inline]
pub fn max_local(usable_size: usize) -> usize {
    usable_size - 35
}

/// Smallest local portion of a spilled payload.
#[inline]
pub fn min_local(usable_size: usize) -> usize {
    (usable_size - 12) * 32 / 255 - 23
}

/// Returns how many payload bytes a leaf cell keeps on its own page.
pub fn local_payload_size(payload_len: usize, usable_size: usize) -> usize {
    let max = max_local(usable_size);
    if payload_len <= max {
        return payload_len;
    }
    let min = min_local(usable_size);
    let local = min + (payload_len - min) % (usable_size - 4);
    if local > max {
        min
    } else {
        local
    }
}

/// A parsed leaf-table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell<'a> {
    /// Row id.
    pub rowid: i64,
    /// Declared payload length.
    pub payload_len: usize,
    /// Payload bytes stored on the leaf page.
    pub local: &'a [u8],
    /// First overflow page, if the payload spills.
    pub first_overflow: Option<u32>,
}

impl<'a> LeafCell<'a> {
    /// Parses the leaf cell at `offset` within the usable area of a page.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the cell runs past the usable area.
    pub fn parse(page_number: u32, usable: &'a [u8], offset: usize) -> LensResult<Self> {
        let err = |what: &str| {
            LensError::page_format(page_number, format!("{what} of cell at {offset} out of bounds"))
        };
        let mut pos = offset;

        let (payload_len, n) = usable
            .get(pos..)
            .and_then(decode_varint)
            .ok_or_else(|| err("payload length"))?;
        pos += n;
        let (rowid, n) = usable
            .get(pos..)
            .and_then(decode_varint)
            .ok_or_else(|| err("rowid"))?;
        pos += n;

        let payload_len = usize::try_from(payload_len).map_err(|_| err("payload length"))?;
        let local_len = local_payload_size(payload_len, usable.len());
        let local = usable
            .get(pos..pos + local_len)
            .ok_or_else(|| err("local payload"))?;
        pos += local_len;

        let first_overflow = if local_len < payload_len {
            let bytes = usable.get(pos..pos + 4).ok_or_else(|| err("overflow pointer"))?;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        } else {
            None
        };

        Ok(Self {
            rowid: rowid as i64,
            payload_len,
            local,
            first_overflow,
        })
    }
}

/// A parsed interior-table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorCell {
    /// Child page holding keys up to `rowid`.
    pub left_child: u32,
    /// Separator key.
    pub rowid: i64,
}

impl InteriorCell {
    /// Parses the interior cell at `offset` within the usable area of a page.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the cell runs past the usable area.
    pub fn parse(page_number: u32, usable: &[u8], offset: usize) -> LensResult<Self> {
        let err = || {
            LensError::page_format(page_number, format!("interior cell at {offset} out of bounds"))
        };
        let child = usable.get(offset..offset + 4).ok_or_else(err)?;
        let left_child = u32::from_be_bytes([child[0], child[1], child[2], child[3]]);
        let (rowid, _) = usable
            .get(offset + 4..)
            .and_then(decode_varint)
            .ok_or_else(err)?;
        Ok(Self {
            left_child,
            rowid: rowid as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::varint::encode_varint;

    #[test]
    fn test_local_size_rule() {
        let usable = 4096;
        assert_eq!(max_local(usable), 4061);
        assert_eq!(min_local(usable), 489);

        // Fits entirely
        assert_eq!(local_payload_size(100, usable), 100);
        assert_eq!(local_payload_size(4061, usable), 4061);

        // Spills: remainder fits under max_local
        let p = 5000;
        assert_eq!(local_payload_size(p, usable), 489 + (p - 489) % 4092);

        // Spills: remainder would exceed max_local, falls back to min_local
        let p = 489 + 4092 + 4080;
        assert_eq!(local_payload_size(p, usable), 489);
    }

    #[test]
    fn test_leaf_cell_inline() {
        let mut page = vec![0u8; 512];
        let mut cell = Vec::new();
        encode_varint(3, &mut cell);
        encode_varint(42, &mut cell);
        cell.extend_from_slice(b"abc");
        page[100..100 + cell.len()].copy_from_slice(&cell);

        let leaf = LeafCell::parse(2, &page, 100).unwrap();
        assert_eq!(leaf.rowid, 42);
        assert_eq!(leaf.local, b"abc");
        assert_eq!(leaf.first_overflow, None);
    }

    #[test]
    fn test_leaf_cell_spilled() {
        let usable = 512;
        let payload_len = 1000;
        let local_len = local_payload_size(payload_len, usable);
        let mut page = vec![0u8; usable];
        let mut cell = Vec::new();
        encode_varint(payload_len as u64, &mut cell);
        encode_varint(1, &mut cell);
        cell.extend(std::iter::repeat(7u8).take(local_len));
        cell.extend_from_slice(&9u32.to_be_bytes());
        page[20..20 + cell.len()].copy_from_slice(&cell);

        let leaf = LeafCell::parse(2, &page, 20).unwrap();
        assert_eq!(leaf.local.len(), local_len);
        assert_eq!(leaf.first_overflow, Some(9));
    }

    #[test]
    fn test_leaf_cell_out_of_bounds() {
        let mut page = vec![0u8; 512];
        let mut cell = Vec::new();
        encode_varint(200, &mut cell);
        encode_varint(1, &mut cell);
        let at = 400;
        page[at..at + cell.len()].copy_from_slice(&cell);
        assert!(LeafCell::parse(2, &page, at).is_err());
    }

    #[test]
    fn test_interior_cell() {
        let mut page = vec![0u8; 512];
        page[50..54].copy_from_slice(&7u32.to_be_bytes());
        let mut key = Vec::new();
        encode_varint(300, &mut key);
        page[54..54 + key.len()].copy_from_slice(&key);

        let cell = InteriorCell::parse(3, &page, 50).unwrap();
        assert_eq!(cell.left_child, 7);
        assert_eq!(cell.rowid, 300);
    }
}
