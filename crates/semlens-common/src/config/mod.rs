//! Configuration for SemLens.
//!
//! This module contains configuration structures for the loader and the
//! columnar decoders.

mod lens;

pub use lens::{ArchiveConfig, DecodeConfig, LensConfig, LimitsConfig};
