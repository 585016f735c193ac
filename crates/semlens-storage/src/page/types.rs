//! Catalog page types.

use std::fmt;

/// Kinds of pages in the catalog database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    /// Interior node of an index tree.
    InteriorIndex,
    /// Interior node of a table tree.
    InteriorTable,
    /// Leaf of an index tree.
    LeafIndex,
    /// Leaf of a table tree.
    LeafTable,
    /// Overflow page continuing a large payload. Carries no type byte.
    Overflow,
}

impl PageType {
    /// Creates a PageType from the B-tree page type byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Self::InteriorIndex),
            0x05 => Some(Self::InteriorTable),
            0x0A => Some(Self::LeafIndex),
            0x0D => Some(Self::LeafTable),
            _ => None,
        }
    }

    /// Returns the type byte, or `None` for overflow pages.
    #[inline]
    pub const fn as_u8(self) -> Option<u8> {
        match self {
            Self::InteriorIndex => Some(0x02),
            Self::InteriorTable => Some(0x05),
            Self::LeafIndex => Some(0x0A),
            Self::LeafTable => Some(0x0D),
            Self::Overflow => None,
        }
    }

    /// Returns true for interior (non-leaf) B-tree pages.
    #[inline]
    pub const fn is_interior(self) -> bool {
        matches!(self, Self::InteriorIndex | Self::InteriorTable)
    }

    /// Returns true for pages of a table tree.
    #[inline]
    pub const fn is_table(self) -> bool {
        matches!(self, Self::InteriorTable | Self::LeafTable)
    }

    /// Returns the size of the B-tree page header.
    #[inline]
    pub const fn header_size(self) -> usize {
        if self.is_interior() {
            12
        } else {
            8
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InteriorIndex => write!(f, "InteriorIndex"),
            Self::InteriorTable => write!(f, "InteriorTable"),
            Self::LeafIndex => write!(f, "LeafIndex"),
            Self::LeafTable => write!(f, "LeafTable"),
            Self::Overflow => write!(f, "Overflow"),
        }
    }
}
