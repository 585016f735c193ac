//! Package loading.
//!
//! Runs the pipeline from package bytes to a [`DataModel`]:
//!
//! ```text
//! archive entry ─▶ decompress ─▶ directory container ─▶ catalog pages
//!                  (async)                                  │
//!                                                           ▼
//!                                     DataModel ◀── catalog projection
//! ```
//!
//! Decompression is the only suspension point. Everything after it is
//! synchronous and works on one immutable buffer.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use semlens_common::{LensConfig, LensError, LensResult};
use semlens_storage::{DirectoryContainer, PageEngine};
use tracing::{debug, info};

use crate::archive::ArchiveReader;
use crate::catalog::project;
use crate::decompress::BlockDecompressor;
use crate::model::DataModel;
use crate::vertipaq::DecodeSettings;

/// Loads model packages.
pub struct ModelLoader {
    config: LensConfig,
    settings: DecodeSettings,
    decompressor: Arc<dyn BlockDecompressor>,
}

impl ModelLoader {
    /// Creates a loader.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(config: LensConfig, decompressor: Arc<dyn BlockDecompressor>) -> LensResult<Self> {
        config.validate()?;
        let settings = DecodeSettings::from_config(&config.decode)?;
        Ok(Self {
            config,
            settings,
            decompressor,
        })
    }

    /// Returns the loader configuration.
    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Returns the name of the block decompressor in use.
    pub fn decompressor_name(&self) -> &str {
        self.decompressor.name()
    }

    /// Reads and loads a package file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::load`].
    pub async fn load_path(&self, path: &Path) -> LensResult<DataModel> {
        let package = tokio::fs::read(path).await?;
        debug!(path = %path.display(), bytes = package.len(), "read package file");
        self.load(Bytes::from(package)).await
    }

    /// Loads a package from its bytes.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of any stage: `Archive`,
    /// `Decompression`, `BadMagic`, `MalformedDirectory`, `PageFormat`, or
    /// `CatalogConsistency` for a missing required catalog table.
    pub async fn load(&self, package: Bytes) -> LensResult<DataModel> {
        let started = Instant::now();
        let max_bytes = self.config.limits.max_blob_bytes;

        let compressed = {
            let mut archive = ArchiveReader::open(package)?;
            archive.entry(&self.config.archive.data_model_entry, max_bytes)?
        };

        debug!(
            decompressor = self.decompressor.name(),
            bytes = compressed.len(),
            "decompressing model blob"
        );
        let blob = self.decompressor.decompress(&compressed).await?;
        if blob.len() as u64 > max_bytes {
            return Err(LensError::decompression(format!(
                "decompressed blob of {} bytes exceeds the {max_bytes}-byte limit",
                blob.len()
            )));
        }

        let model = self.load_blob(Bytes::from(blob))?;
        info!(
            tables = model.table_names().len(),
            warnings = model.warnings().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(model)
    }

    /// Loads an already decompressed blob.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` or `MalformedDirectory` for a bad container,
    /// `MalformedDirectory` if the catalog slice is missing, and
    /// `PageFormat` or `CatalogConsistency` for an unreadable catalog.
    pub fn load_blob(&self, blob: Bytes) -> LensResult<DataModel> {
        let container = DirectoryContainer::parse(blob)?;
        debug!(
            slices = container.slices().len(),
            bytes = container.blob_len(),
            "parsed directory container"
        );

        let catalog_name = &self.config.archive.catalog_slice;
        let catalog = container.slice(catalog_name).ok_or_else(|| {
            LensError::malformed_directory(format!("catalog slice '{catalog_name}' is missing"))
        })?;

        let engine = PageEngine::open(catalog)?;
        debug!(
            pages = engine.page_count(),
            page_size = engine.header().page_size,
            "opened catalog database"
        );

        let projection = project(&engine)?;
        Ok(DataModel::new(
            container,
            projection,
            self.settings,
            self.config.limits.max_rows,
        ))
    }
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("config", &self.config)
            .field("decompressor", &self.decompressor.name())
            .finish()
    }
}
