//! Package archives and a framing block codec.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use semlens_common::LensError;
use semlens_model::decompress::{BlockDecompressor, DecompressFuture};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Writes a ZIP archive with deflated entries.
pub fn zip_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A stand-in block codec: a magic, the blob length, then the blob.
///
/// Input whose length field disagrees with the bytes present is rejected
/// the way a real codec rejects a truncated stream.
#[derive(Debug, Default)]
pub struct FramedCodec {
    calls: AtomicUsize,
}

impl FramedCodec {
    /// Frame magic.
    pub const MAGIC: &'static [u8; 4] = b"FRM1";

    /// Creates a codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames a blob.
    pub fn compress(blob: &[u8]) -> Vec<u8> {
        let mut out = Self::MAGIC.to_vec();
        out.extend_from_slice(&(blob.len() as u64).to_le_bytes());
        out.extend_from_slice(blob);
        out
    }

    /// Returns how many times `decompress` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unframe(input: &[u8]) -> Result<Vec<u8>, LensError> {
        let body = input
            .strip_prefix(Self::MAGIC.as_slice())
            .ok_or_else(|| LensError::decompression("missing frame magic"))?;
        if body.len() < 8 {
            return Err(LensError::decompression("truncated frame header"));
        }
        let (len, blob) = body.split_at(8);
        let declared = u64::from_le_bytes(len.try_into().expect("8 bytes"));
        if declared != blob.len() as u64 {
            return Err(LensError::decompression(format!(
                "frame declares {declared} bytes, stream holds {}",
                blob.len()
            )));
        }
        Ok(blob.to_vec())
    }
}

impl BlockDecompressor for FramedCodec {
    fn decompress<'a>(&'a self, input: &'a [u8]) -> DecompressFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Self::unframe(input) })
    }

    fn name(&self) -> &str {
        "framed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unframe() {
        let framed = FramedCodec::compress(b"blob");
        assert_eq!(FramedCodec::unframe(&framed).unwrap(), b"blob");
        assert!(FramedCodec::unframe(&framed[..framed.len() - 1]).is_err());
        assert!(FramedCodec::unframe(b"XXXX").is_err());
    }
}
