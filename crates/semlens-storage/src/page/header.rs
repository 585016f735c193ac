//! Database and page headers.
//!
//! # Database Header (first 100 bytes of page 1)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0      16   magic ("SQLite format 3\0")
//!  16       2   page_size (BE; 1 means 65536)
//!  20       1   reserved bytes at the end of each page
//!  56       4   text encoding (BE; 1 UTF-8, 2 UTF-16le, 3 UTF-16be)
//! ```
//!
//! # B-tree Page Header (at offset 0, or 100 on page 1)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       1   page type
//!   1       2   first freeblock
//!   3       2   cell count
//!   5       2   start of cell content area
//!   7       1   fragmented free bytes
//!   8       4   right-most child (interior pages only)
//! ```
//!
//! The cell pointer array follows the header: one BE `u16` page offset per
//! cell, in key order.

use semlens_common::constants::{
    CATALOG_DB_HEADER_SIZE, CATALOG_DB_MAGIC, DEFAULT_CATALOG_PAGE_SIZE, MIN_CATALOG_PAGE_SIZE,
    MIN_USABLE_PAGE_SIZE,
};
use semlens_common::{LensError, LensResult};

use super::types::PageType;

const PAGE_SIZE_OFFSET: usize = 16;
const RESERVED_OFFSET: usize = 20;
const TEXT_ENCODING_OFFSET: usize = 56;

/// Largest page size stored literally in the header.
const MAX_LITERAL_PAGE_SIZE: usize = 32 * 1024;

/// Encoding of text values in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16 little-endian.
    Utf16Le,
    /// UTF-16 big-endian.
    Utf16Be,
}

impl TextEncoding {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            // 0 is written by some producers for a fresh database
            0 | 1 => Some(Self::Utf8),
            2 => Some(Self::Utf16Le),
            3 => Some(Self::Utf16Be),
            _ => None,
        }
    }

    /// Decodes text bytes in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Self::Utf16Le | Self::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if self == Self::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).ok()
            }
        }
    }
}

/// Parsed database header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHeader {
    /// Page size in bytes.
    pub page_size: usize,
    /// Reserved bytes at the end of every page.
    pub reserved: u8,
    /// Text encoding of string values.
    pub text_encoding: TextEncoding,
}

impl DbHeader {
    /// Parses the header at the start of the database slice.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` (page 0) if the slice is too short, the magic
    /// does not match, or the page geometry is invalid.
    pub fn parse(data: &[u8]) -> LensResult<Self> {
        if data.len() < CATALOG_DB_HEADER_SIZE {
            return Err(LensError::page_format(
                0,
                format!("database header truncated at {} bytes", data.len()),
            ));
        }
        if &data[..CATALOG_DB_MAGIC.len()] != CATALOG_DB_MAGIC {
            return Err(LensError::page_format(0, "bad database magic"));
        }

        let raw = u16::from_be_bytes([data[PAGE_SIZE_OFFSET], data[PAGE_SIZE_OFFSET + 1]]);
        let page_size = match raw {
            0 | 1 => DEFAULT_CATALOG_PAGE_SIZE,
            n => usize::from(n),
        };
        if !page_size.is_power_of_two()
            || page_size < MIN_CATALOG_PAGE_SIZE
            || (raw > 1 && page_size > MAX_LITERAL_PAGE_SIZE)
        {
            return Err(LensError::page_format(
                0,
                format!("invalid page size {page_size}"),
            ));
        }

        let reserved = data[RESERVED_OFFSET];
        if page_size - usize::from(reserved) < MIN_USABLE_PAGE_SIZE {
            return Err(LensError::page_format(
                0,
                format!("usable page size below {MIN_USABLE_PAGE_SIZE} bytes"),
            ));
        }

        let encoding = u32::from_be_bytes([
            data[TEXT_ENCODING_OFFSET],
            data[TEXT_ENCODING_OFFSET + 1],
            data[TEXT_ENCODING_OFFSET + 2],
            data[TEXT_ENCODING_OFFSET + 3],
        ]);
        let text_encoding = TextEncoding::from_u32(encoding).ok_or_else(|| {
            LensError::page_format(0, format!("unknown text encoding {encoding}"))
        })?;

        Ok(Self {
            page_size,
            reserved,
            text_encoding,
        })
    }

    /// Returns the usable area of each page.
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.page_size - usize::from(self.reserved)
    }
}

/// Read-only view of one B-tree page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Page type.
    pub page_type: PageType,
    /// Cell offsets from the start of the page, in key order.
    pub cell_pointers: Vec<u16>,
    /// Right-most child for interior pages.
    pub right_most_child: Option<u32>,
}

impl PageRef {
    /// Parses the B-tree header and cell pointer array of a page.
    ///
    /// `page` is the full page; only its first `usable_size` bytes are
    /// considered.
    ///
    /// # Errors
    ///
    /// Returns `PageFormat` if the type byte is unknown, the header or
    /// pointer array does not fit, or a cell pointer lies outside the
    /// cell content area.
    pub fn parse(page_number: u32, page: &[u8], usable_size: usize) -> LensResult<Self> {
        let usable = &page[..usable_size.min(page.len())];
        let base = if page_number == 1 {
            CATALOG_DB_HEADER_SIZE
        } else {
            0
        };
        let err = |reason: String| LensError::page_format(page_number, reason);

        let type_byte = *usable
            .get(base)
            .ok_or_else(|| err("page header out of bounds".to_string()))?;
        let page_type = PageType::from_u8(type_byte)
            .ok_or_else(|| err(format!("unknown page type 0x{type_byte:02X}")))?;

        let header_end = base + page_type.header_size();
        if header_end > usable.len() {
            return Err(err("page header out of bounds".to_string()));
        }
        let header = &usable[base..header_end];
        let cell_count = usize::from(u16::from_be_bytes([header[3], header[4]]));
        let right_most_child = page_type
            .is_interior()
            .then(|| u32::from_be_bytes([header[8], header[9], header[10], header[11]]));

        let array_end = header_end + cell_count * 2;
        if array_end > usable.len() {
            return Err(err(format!(
                "cell pointer array of {cell_count} cells overruns the page"
            )));
        }

        let mut cell_pointers = Vec::with_capacity(cell_count);
        for chunk in usable[header_end..array_end].chunks_exact(2) {
            let pointer = u16::from_be_bytes([chunk[0], chunk[1]]);
            let offset = usize::from(pointer);
            if offset < array_end || offset >= usable.len() {
                return Err(err(format!("cell pointer {pointer} outside the cell area")));
            }
            cell_pointers.push(pointer);
        }

        Ok(Self {
            page_number,
            page_type,
            cell_pointers,
            right_most_child,
        })
    }

    /// Returns the number of cells on the page.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_pointers.len()
    }
}
