//! Directory container parsing.
//!
//! The decompressed model blob is a signed directory of named byte ranges
//! ("slices"). One slice holds the catalog database; the others hold the
//! columnar dictionaries and packed indices referenced from the catalog.
//!
//! # Layout (all integers little-endian)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0      70   signature (UTF-16LE "STREAM_STORAGE_SIGNATURE_)!@#$%^&*(")
//!  70       4   version (must be 1)
//!  74       4   entry_count
//!  78       …   entries
//!
//! Entry:
//!   2   name_len
//!   n   name (UTF-8)
//!   8   offset (from start of blob)
//!   8   length
//! ```

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use semlens_common::constants::{CONTAINER_SIGNATURE, CONTAINER_SIGNATURE_SIZE, CONTAINER_VERSION};
use semlens_common::{LensError, LensResult};
use tracing::debug;

use crate::reader::{ByteCursor, ByteRange, Truncated};

/// A named region of the decompressed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlice {
    name: String,
    range: ByteRange,
}

impl RawSlice {
    /// Returns the slice name as stored in the directory.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the offset of the slice within the blob.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.range.offset
    }

    /// Returns the length of the slice in bytes.
    #[inline]
    pub fn length(&self) -> u64 {
        self.range.length
    }

    /// Returns the trailing path component of the name.
    pub fn file_name(&self) -> &str {
        trailing_component(&self.name)
    }
}

impl fmt::Display for RawSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}+{}",
            self.name, self.range.offset, self.range.length
        )
    }
}

/// Parsed directory over an immutable blob.
///
/// # Example
///
/// ```rust,ignore
/// let container = DirectoryContainer::parse(blob)?;
/// let catalog = container.slice("metadata.sqlitedb").expect("catalog slice");
/// ```
#[derive(Clone)]
pub struct DirectoryContainer {
    blob: Bytes,
    slices: Vec<RawSlice>,
    by_name: HashMap<String, usize>,
}

impl DirectoryContainer {
    /// Parses the directory at the start of `blob`.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` if the signature does not match, and
    /// `MalformedDirectory` if the directory is truncated, has an
    /// unsupported version, repeats a name, or describes a slice that does
    /// not fit inside the blob.
    pub fn parse(blob: Bytes) -> LensResult<Self> {
        check_signature(&blob)?;

        let total = blob.len() as u64;
        let mut cursor = ByteCursor::new(&blob[CONTAINER_SIGNATURE_SIZE..]);

        let version = cursor.read_u32_le().map_err(|e| truncated("version", e))?;
        if version != CONTAINER_VERSION {
            return Err(LensError::malformed_directory(format!(
                "unsupported version {version}"
            )));
        }
        let entry_count = cursor
            .read_u32_le()
            .map_err(|e| truncated("entry count", e))?;

        let mut slices = Vec::new();
        let mut by_name = HashMap::new();

        for index in 0..entry_count {
            let slice = read_entry(&mut cursor, index)?;
            if !slice.range.fits_within(total) {
                return Err(LensError::malformed_directory(format!(
                    "slice '{}' ({}+{}) exceeds blob of {total} bytes",
                    slice.name, slice.range.offset, slice.range.length
                )));
            }
            if by_name.insert(slice.name.clone(), slices.len()).is_some() {
                return Err(LensError::malformed_directory(format!(
                    "duplicate slice name '{}'",
                    slice.name
                )));
            }
            slices.push(slice);
        }

        debug!(
            blob_bytes = total,
            slices = slices.len(),
            "parsed directory container"
        );

        Ok(Self {
            blob,
            slices,
            by_name,
        })
    }

    /// Returns all slices in directory order.
    #[inline]
    pub fn slices(&self) -> &[RawSlice] {
        &self.slices
    }

    /// Returns the size of the underlying blob.
    #[inline]
    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }

    /// Finds a slice by name.
    ///
    /// An exact match wins. Otherwise the first slice (in directory order)
    /// whose trailing path component equals the trailing component of
    /// `name` is returned.
    pub fn find(&self, name: &str) -> Option<&RawSlice> {
        if let Some(&index) = self.by_name.get(name) {
            return Some(&self.slices[index]);
        }
        let wanted = trailing_component(name);
        self.slices.iter().find(|s| s.file_name() == wanted)
    }

    /// Returns the bytes of a named slice as a zero-copy view.
    pub fn slice(&self, name: &str) -> Option<Bytes> {
        self.find(name).map(|s| self.bytes_of(s))
    }

    /// Returns the bytes of a slice taken from this container.
    pub fn bytes_of(&self, slice: &RawSlice) -> Bytes {
        // Ranges were checked against the blob during parsing.
        match slice.range.to_index_range() {
            Some(range) => self.blob.slice(range),
            None => Bytes::new(),
        }
    }
}

impl fmt::Debug for DirectoryContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryContainer")
            .field("blob_len", &self.blob.len())
            .field("slices", &self.slices)
            .finish()
    }
}

/// Returns the UTF-16LE encoding of the container signature.
pub fn signature_bytes() -> Vec<u8> {
    CONTAINER_SIGNATURE
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn check_signature(blob: &[u8]) -> LensResult<()> {
    if blob.len() < CONTAINER_SIGNATURE_SIZE {
        return Err(LensError::BadMagic {
            reason: format!(
                "blob of {} bytes is shorter than the {CONTAINER_SIGNATURE_SIZE}-byte signature",
                blob.len()
            ),
        });
    }
    if blob[..CONTAINER_SIGNATURE_SIZE] != signature_bytes()[..] {
        return Err(LensError::BadMagic {
            reason: "signature mismatch".to_string(),
        });
    }
    Ok(())
}

fn read_entry(cursor: &mut ByteCursor<'_>, index: u32) -> LensResult<RawSlice> {
    let what = || format!("entry {index}");
    let name_len = cursor
        .read_u16_le()
        .map_err(|e| truncated(&what(), e))?;
    let name_bytes = cursor
        .read_bytes(usize::from(name_len))
        .map_err(|e| truncated(&what(), e))?;
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| LensError::malformed_directory(format!("{} name is not UTF-8", what())))?
        .to_string();
    let offset = cursor.read_u64_le().map_err(|e| truncated(&what(), e))?;
    let length = cursor.read_u64_le().map_err(|e| truncated(&what(), e))?;

    Ok(RawSlice {
        name,
        range: ByteRange::new(offset, length),
    })
}

fn truncated(field: &str, err: Truncated) -> LensError {
    LensError::malformed_directory(format!("truncated {field}: {err}"))
}

fn trailing_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semlens_common::ErrorCode;

    fn build(entries: &[(&str, u64, u64)], payload: &[u8]) -> Bytes {
        let mut out = signature_bytes();
        out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (name, offset, length) in entries {
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&length.to_le_bytes());
        }
        out.extend_from_slice(payload);
        Bytes::from(out)
    }

    #[test]
    fn test_parse_and_lookup() {
        // Signature, version and count, then two entries of 2 + name + 16 bytes
        let preamble = (CONTAINER_SIGNATURE_SIZE + 8) as u64;
        let header = preamble + (2 + 1 + 16) + (2 + 9 + 16);
        let blob = build(&[("a", header, 4), ("dir/b.idf", header + 4, 2)], b"ABCDEF");
        let container = DirectoryContainer::parse(blob).unwrap();
        assert_eq!(container.slices().len(), 2);

        assert_eq!(container.find("a").unwrap().length(), 4);
        assert_eq!(container.find("b.idf").unwrap().name(), "dir/b.idf");
        assert_eq!(container.find("other\\b.idf").unwrap().name(), "dir/b.idf");
        assert!(container.find("missing").is_none());

        assert_eq!(&container.slice("a").unwrap()[..], b"ABCD");
        assert_eq!(&container.slice("b.idf").unwrap()[..], b"EF");
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = build(&[], b"").to_vec();
        raw[0] ^= 0xFF;
        let err = DirectoryContainer::parse(Bytes::from(raw)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadMagic);

        let err = DirectoryContainer::parse(Bytes::from_static(b"short")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadMagic);
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let err = DirectoryContainer::parse(build(&[("big", 0, 1 << 40)], b"")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDirectory);

        let err =
            DirectoryContainer::parse(build(&[("wrap", u64::MAX, 2)], b"")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDirectory);
    }

    #[test]
    fn test_duplicate_name() {
        let err = DirectoryContainer::parse(build(&[("x", 0, 1), ("x", 1, 1)], b"")).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_truncated_directory() {
        let blob = build(&[("entry", 0, 1)], b"");
        let cut = blob.slice(..blob.len() - 3);
        let err = DirectoryContainer::parse(cut).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDirectory);
    }

    #[test]
    fn test_unsupported_version() {
        let mut raw = build(&[], b"").to_vec();
        raw[CONTAINER_SIGNATURE_SIZE] = 9;
        let err = DirectoryContainer::parse(Bytes::from(raw)).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }
}
