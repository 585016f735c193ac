//! Catalog record decoding.
//!
//! A record is a header of serial types followed by the field bodies:
//!
//! ```text
//! varint     header length (including this varint)
//! varint...  one serial type per field
//! bytes...   field bodies, in order
//! ```
//!
//! | Serial type   | Body                                   |
//! |---------------|----------------------------------------|
//! | 0             | NULL, no body                          |
//! | 1..=6         | BE signed int of 1, 2, 3, 4, 6, 8 bytes |
//! | 7             | BE IEEE-754 double                     |
//! | 8, 9          | constant false / true, no body         |
//! | even >= 12    | blob of `(n - 12) / 2` bytes           |
//! | odd >= 13     | text of `(n - 13) / 2` bytes           |
//! | anything else | NULL, no body                          |

use std::fmt;

use semlens_common::{LensError, LensResult};

use super::header::TextEncoding;
use super::varint::decode_varint;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Integer(i64),
    /// Double.
    Float(f64),
    /// Text.
    Text(String),
    /// Blob.
    Blob(Vec<u8>),
    /// Constant 0 or 1 (serial types 8 and 9).
    Bool(bool),
}

impl RecordValue {
    /// Returns true for NULL.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an integer.
    ///
    /// Booleans read as 0/1; integral floats are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Returns the value as a double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the value as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean. Non-zero integers are true.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|x| format!("{x:02x}")).collect();
                write!(f, "x'{hex}'")
            }
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
        }
    }
}

/// One field of a record, with the serial type it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Serial type code from the record header.
    pub serial_type: u64,
    /// Decoded value.
    pub value: RecordValue,
}

/// A decoded row of a catalog table.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    /// Row id (the table B-tree key).
    pub rowid: i64,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

impl CatalogRow {
    /// Returns the value at `index`, or `None` past the stored fields.
    ///
    /// Records written before a column was added are shorter than the
    /// current schema; the missing trailing fields read as absent.
    #[inline]
    pub fn value(&self, index: usize) -> Option<&RecordValue> {
        self.fields.get(index).map(|f| &f.value)
    }

    /// Returns the number of stored fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Returns the body size of a serial type.
pub fn serial_body_size(serial_type: u64) -> u64 {
    match serial_type {
        1..=4 => serial_type,
        5 => 6,
        6 | 7 => 8,
        n if n >= 12 => (n - 12) / 2,
        _ => 0,
    }
}

/// Decodes a record payload.
///
/// # Errors
///
/// Returns `RecordDecode` if the header is malformed, a body runs past
/// the payload, or text is not valid in the database encoding.
pub fn decode_record(
    rowid: i64,
    payload: &[u8],
    encoding: TextEncoding,
) -> LensResult<Vec<Field>> {
    let err = |reason: String| LensError::record_decode(rowid, reason);

    let (header_len, mut pos) =
        decode_varint(payload).ok_or_else(|| err("truncated record header".to_string()))?;
    let header_len = usize::try_from(header_len)
        .ok()
        .filter(|&len| len >= pos && len <= payload.len())
        .ok_or_else(|| err(format!("record header length {header_len} out of range")))?;

    let mut serial_types = Vec::new();
    while pos < header_len {
        let (serial_type, n) = decode_varint(&payload[pos..header_len])
            .ok_or_else(|| err("serial type crosses header end".to_string()))?;
        serial_types.push(serial_type);
        pos += n;
    }

    let mut body = header_len;
    let mut fields = Vec::with_capacity(serial_types.len());
    for (index, serial_type) in serial_types.into_iter().enumerate() {
        let size = usize::try_from(serial_body_size(serial_type))
            .map_err(|_| err(format!("field {index} too large")))?;
        let bytes = body
            .checked_add(size)
            .and_then(|end| payload.get(body..end))
            .ok_or_else(|| {
                err(format!(
                    "field {index} (serial type {serial_type}) runs past the payload"
                ))
            })?;
        body += size;

        let value = match serial_type {
            0 | 10 | 11 => RecordValue::Null,
            1..=6 => RecordValue::Integer(read_signed_be(bytes)),
            7 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                RecordValue::Float(f64::from_be_bytes(raw))
            }
            8 => RecordValue::Bool(false),
            9 => RecordValue::Bool(true),
            n if n % 2 == 0 => RecordValue::Blob(bytes.to_vec()),
            _ => RecordValue::Text(
                encoding
                    .decode(bytes)
                    .ok_or_else(|| err(format!("field {index} is not valid text")))?,
            ),
        };
        fields.push(Field { serial_type, value });
    }

    Ok(fields)
}

/// Sign-extends a big-endian integer of 1 to 8 bytes.
fn read_signed_be(bytes: &[u8]) -> i64 {
    let mut value: i64 = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        -1
    } else {
        0
    };
    for &byte in bytes {
        value = (value << 8) | i64::from(byte);
    }
    value
}
