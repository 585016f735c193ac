//! Loader configuration structures.
//!
//! These structures define every configurable aspect of a model load.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CATALOG_SLICE, DEFAULT_DATA_MODEL_ENTRY, DEFAULT_DATETIME_EPOCH,
    DEFAULT_DECIMAL_SCALE, DEFAULT_MAX_BLOB_BYTES, DEFAULT_MAX_ROWS, DEFAULT_PREVIEW_ROWS,
    DEFAULT_TICKS_PER_SECOND,
};
use crate::error::{LensError, LensResult};

/// Format accepted for [`DecodeConfig::datetime_epoch`].
const EPOCH_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Main loader configuration.
///
/// # Example
///
/// ```rust
/// use semlens_common::config::LensConfig;
///
/// let config = LensConfig::default();
/// assert_eq!(config.archive.data_model_entry, "DataModel");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Archive and container naming.
    pub archive: ArchiveConfig,

    /// Columnar value decoding constants.
    pub decode: DecodeConfig,

    /// Resource limits.
    pub limits: LimitsConfig,
}

impl LensConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for testing with small limits.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            limits: LimitsConfig {
                max_blob_bytes: 64 * 1024 * 1024, // 64 MB for tests
                max_rows: 1_000_000,
                preview_rows: 10,
            },
            ..Default::default()
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn from_file(path: &Path) -> LensResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or fails validation.
    pub fn from_toml_str(content: &str) -> LensResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LensError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> LensResult<String> {
        toml::to_string_pretty(self).map_err(|e| LensError::invalid_config(e.to_string()))
    }

    /// Sets the archive entry holding the compressed model.
    #[must_use]
    pub fn with_data_model_entry(mut self, entry: impl Into<String>) -> Self {
        self.archive.data_model_entry = entry.into();
        self
    }

    /// Sets the decimal scale.
    #[must_use]
    pub fn with_decimal_scale(mut self, scale: u32) -> Self {
        self.decode.decimal_scale = scale;
        self
    }

    /// Sets the maximum decompressed blob size.
    #[must_use]
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.limits.max_blob_bytes = bytes;
        self
    }

    /// Sets the row limit applied to catalog row-count statistics.
    #[must_use]
    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.limits.max_rows = rows;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> LensResult<()> {
        if self.archive.data_model_entry.is_empty() {
            return Err(LensError::invalid_config("archive.data_model_entry is empty"));
        }
        if self.archive.catalog_slice.is_empty() {
            return Err(LensError::invalid_config("archive.catalog_slice is empty"));
        }
        if self.decode.decimal_scale > 18 {
            return Err(LensError::invalid_config(
                "decode.decimal_scale must be at most 18",
            ));
        }
        if self.decode.ticks_per_second == 0 {
            return Err(LensError::invalid_config(
                "decode.ticks_per_second must be positive",
            ));
        }
        self.decode.epoch()?;
        if self.limits.max_blob_bytes == 0 {
            return Err(LensError::invalid_config("limits.max_blob_bytes must be positive"));
        }
        Ok(())
    }
}

/// Archive and container naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive entry holding the compressed model blob.
    /// Default: "DataModel"
    pub data_model_entry: String,

    /// Directory slice holding the catalog database.
    /// Default: "metadata.sqlitedb"
    pub catalog_slice: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            data_model_entry: DEFAULT_DATA_MODEL_ENTRY.to_string(),
            catalog_slice: DEFAULT_CATALOG_SLICE.to_string(),
        }
    }
}

/// Columnar value decoding constants.
///
/// These are format constants that must match the files being read; they
/// are configurable so they can be validated against known samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Power-of-ten scale of decimal dictionary entries.
    /// Default: 4
    pub decimal_scale: u32,

    /// Epoch of date/time tick counts, `YYYY-MM-DDTHH:MM:SS`.
    /// Default: "1899-12-30T00:00:00"
    pub datetime_epoch: String,

    /// Date/time tick resolution.
    /// Default: 10000000 (100 ns ticks)
    pub ticks_per_second: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            decimal_scale: DEFAULT_DECIMAL_SCALE,
            datetime_epoch: DEFAULT_DATETIME_EPOCH.to_string(),
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

impl DecodeConfig {
    /// Returns the parsed date/time epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the epoch text is not `YYYY-MM-DDTHH:MM:SS`.
    pub fn epoch(&self) -> LensResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.datetime_epoch, EPOCH_FORMAT).map_err(|e| {
            LensError::invalid_config(format!(
                "decode.datetime_epoch '{}': {e}",
                self.datetime_epoch
            ))
        })
    }
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest decompressed blob accepted.
    /// Default: 4 GB
    pub max_blob_bytes: u64,

    /// Largest row count taken from a catalog statistic when no column
    /// of a table decodes.
    /// Default: 50000000
    pub max_rows: usize,

    /// Rows shown by preview front-ends.
    /// Default: 100
    pub preview_rows: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}
