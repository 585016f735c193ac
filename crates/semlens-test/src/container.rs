//! Directory container builder.

use semlens_common::constants::CONTAINER_VERSION;
use semlens_storage::container::signature_bytes;

/// Builds a directory container. Slice data follows the directory in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    slices: Vec<(String, Vec<u8>)>,
}

impl ContainerBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named slice.
    pub fn slice(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.add(name, data);
        self
    }

    /// Adds a named slice in place.
    pub fn add(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.slices.push((name.into(), data.into()));
        self
    }

    /// Returns the slice names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.slices.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Lays out the container.
    pub fn build(&self) -> Vec<u8> {
        let mut out = signature_bytes();
        out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.slices.len() as u32).to_le_bytes());

        let directory_len: usize = self.slices.iter().map(|(n, _)| 2 + n.len() + 16).sum();
        let mut offset = (out.len() + directory_len) as u64;
        for (name, data) in &self.slices {
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&(data.len() as u64).to_le_bytes());
            offset += data.len() as u64;
        }
        for (_, data) in &self.slices {
            out.extend_from_slice(data);
        }
        out
    }
}
