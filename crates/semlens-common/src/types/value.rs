//! Declared column types and materialized cell values.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Declared data type of a model column.
///
/// The numeric codes are the catalog's own data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Double,
    /// Date and time.
    DateTime,
    /// Fixed-point decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Raw bytes.
    Binary,
    /// Unrecognized or automatic type.
    Unknown,
}

impl DataType {
    /// Catalog code for the automatic (inferred) type.
    pub const AUTOMATIC_CODE: i64 = 1;

    /// Maps a catalog data type code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            2 => Self::String,
            6 => Self::Int64,
            8 => Self::Double,
            9 => Self::DateTime,
            10 => Self::Decimal,
            11 => Self::Boolean,
            17 => Self::Binary,
            _ => Self::Unknown,
        }
    }

    /// Returns the catalog code of this type.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::String => 2,
            Self::Int64 => 6,
            Self::Double => 8,
            Self::DateTime => 9,
            Self::Decimal => 10,
            Self::Boolean => 11,
            Self::Binary => 17,
            Self::Unknown => 19,
        }
    }

    /// Returns the display name used in schema listings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::DateTime => "dateTime",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-point decimal: `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Scaled integer value.
    pub mantissa: i64,
    /// Number of fractional digits.
    pub scale: u32,
}

impl Decimal {
    /// Creates a decimal from a mantissa and scale.
    #[must_use]
    pub const fn new(mantissa: i64, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    /// Returns the closest `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10u64.pow(self.scale);
        let abs = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let width = self.scale as usize;
        write!(f, "{sign}{}.{:0width$}", abs / divisor, abs % divisor)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single materialized value of a model column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Int64(i64),
    /// Floating point value.
    Double(f64),
    /// Fixed-point decimal value.
    Decimal(Decimal),
    /// Date/time value.
    DateTime(NaiveDateTime),
    /// Boolean value.
    Boolean(bool),
    /// Binary value.
    Binary(Vec<u8>),
}

impl CellValue {
    /// Returns true if the value is blank.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if the value can appear in a column of `data_type`.
    ///
    /// Blanks are valid in every column.
    #[must_use]
    pub fn matches_type(&self, data_type: DataType) -> bool {
        match self {
            Self::Null => true,
            Self::Text(_) => data_type == DataType::String,
            Self::Int64(_) => data_type == DataType::Int64,
            Self::Double(_) => data_type == DataType::Double,
            Self::Decimal(_) => data_type == DataType::Decimal,
            Self::DateTime(_) => data_type == DataType::DateTime,
            Self::Boolean(_) => data_type == DataType::Boolean,
            Self::Binary(_) => data_type == DataType::Binary,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}
