//! Package archive access.
//!
//! A model package is a ZIP archive. Only one entry matters to the loader
//! (the compressed model blob), but entry listing is exposed for
//! diagnostics.

use std::io::{Cursor, Read};

use bytes::Bytes;
use semlens_common::{LensError, LensResult};
use tracing::debug;
use zip::ZipArchive;

/// Read access to a package archive held in memory.
pub struct ArchiveReader {
    archive: ZipArchive<Cursor<Bytes>>,
}

impl ArchiveReader {
    /// Opens an archive from its bytes.
    ///
    /// # Errors
    ///
    /// Returns `Archive` if the bytes are not a readable ZIP file.
    pub fn open(bytes: Bytes) -> LensResult<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LensError::archive(format!("not a package archive: {e}")))?;
        debug!(entries = archive.len(), "opened package archive");
        Ok(Self { archive })
    }

    /// Returns the entry names in archive order.
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Resolves an entry name, falling back to a case-insensitive match.
    fn resolve(&self, name: &str) -> Option<String> {
        if self.archive.index_for_name(name).is_some() {
            return Some(name.to_string());
        }
        self.archive
            .file_names()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(str::to_string)
    }

    /// Reads a whole entry.
    ///
    /// # Errors
    ///
    /// Returns `Archive` if the entry is missing, larger than `max_bytes`,
    /// or cannot be read.
    pub fn entry(&mut self, name: &str, max_bytes: u64) -> LensResult<Bytes> {
        let resolved = self
            .resolve(name)
            .ok_or_else(|| LensError::archive(format!("entry '{name}' not found")))?;
        let mut file = self
            .archive
            .by_name(&resolved)
            .map_err(|e| LensError::archive(format!("entry '{resolved}': {e}")))?;

        let size = file.size();
        if size > max_bytes {
            return Err(LensError::archive(format!(
                "entry '{resolved}' is {size} bytes, limit is {max_bytes}"
            )));
        }

        let capacity = usize::try_from(size).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        file.by_ref()
            .take(max_bytes)
            .read_to_end(&mut buf)
            .map_err(|e| LensError::archive(format!("reading entry '{resolved}': {e}")))?;

        debug!(entry = %resolved, bytes = buf.len(), "read archive entry");
        Ok(Bytes::from(buf))
    }
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("entries", &self.archive.len())
            .finish()
    }
}
