//! Error handling for SemLens.
//!
//! This module provides the unified error type and result alias used
//! across all pipeline stages, plus the `Warning` record used for
//! conditions that are contained rather than propagated.

mod lens;
mod warning;

pub use lens::{ErrorCode, LensError};
pub use warning::{Warning, WarningScope};

/// Result type alias for SemLens operations.
pub type LensResult<T> = std::result::Result<T, LensError>;
