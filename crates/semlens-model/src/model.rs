//! The loaded model.
//!
//! A [`DataModel`] owns the decompressed blob (through its container) and
//! the projected catalog. Table data is decoded on first access and cached
//! for the model's lifetime; dropping the model releases everything at
//! once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use semlens_common::{LensError, LensResult, Warning};
use semlens_storage::DirectoryContainer;
use tracing::debug;

use crate::catalog::{CatalogGraph, ModelSchema, Projection};
use crate::filter::{filter_schema, is_system_object};
use crate::profile::{profile, TableProfile};
use crate::vertipaq::{DecodeSettings, MaterializedTable, Materializer};

/// A decoded model package.
pub struct DataModel {
    /// Directory container over the decompressed blob.
    container: Arc<DirectoryContainer>,
    /// Resolved catalog, system objects included.
    graph: Arc<CatalogGraph>,
    /// Filtered schema surface.
    schema: ModelSchema,
    /// Columnar decoding constants.
    settings: DecodeSettings,
    /// Row limit for tables sized by catalog statistics.
    max_rows: usize,
    /// Materialized tables by name.
    cache: RwLock<HashMap<String, Arc<MaterializedTable>>>,
    /// Load-level warnings, system objects excluded.
    warnings: Vec<Warning>,
}

impl DataModel {
    /// Assembles a model from a parsed container and its catalog projection.
    pub fn new(
        container: DirectoryContainer,
        projection: Projection,
        settings: DecodeSettings,
        max_rows: usize,
    ) -> Self {
        let Projection { graph, warnings } = projection;
        let schema = filter_schema(ModelSchema::from_graph(&graph));
        let warnings = warnings
            .into_iter()
            .filter(|w| !w.scope.table().is_some_and(is_system_object))
            .collect();

        Self {
            container: Arc::new(container),
            graph: Arc::new(graph),
            schema,
            settings,
            max_rows,
            cache: RwLock::new(HashMap::new()),
            warnings,
        }
    }

    /// Returns the user-visible table names in catalog order.
    pub fn table_names(&self) -> Vec<String> {
        self.schema.table_names()
    }

    /// Returns the schema surface.
    pub fn catalog(&self) -> &ModelSchema {
        &self.schema
    }

    /// Returns the full resolved catalog, system objects included.
    pub fn graph(&self) -> &CatalogGraph {
        &self.graph
    }

    /// Returns the directory container.
    pub fn container(&self) -> &DirectoryContainer {
        &self.container
    }

    /// Returns warnings recorded while loading.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the number of tables materialized so far.
    pub fn cached_tables(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns a table with its rows, decoding it on first access.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` for unknown names and for system objects.
    pub fn table(&self, name: &str) -> LensResult<Arc<MaterializedTable>> {
        if let Some(table) = self.cache.read().get(name) {
            return Ok(Arc::clone(table));
        }

        let catalog_table = self
            .graph
            .table_by_name(name)
            .filter(|t| !is_system_object(&t.name))
            .ok_or_else(|| LensError::TableNotFound {
                table: name.to_string(),
            })?;

        // Decode without holding the lock; the first insert wins
        let materializer =
            Materializer::new(&self.container, self.settings).with_max_rows(self.max_rows);
        let table = Arc::new(materializer.materialize(catalog_table));
        let mut cache = self.cache.write();
        let table = Arc::clone(cache.entry(name.to_string()).or_insert(table));
        let cached = cache.len();
        drop(cache);
        debug!(table = name, cached, "table ready");
        Ok(table)
    }

    /// Decodes a table and profiles its columns.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` for unknown names and for system objects.
    pub fn profile(&self, name: &str) -> LensResult<TableProfile> {
        Ok(profile(&*self.table(name)?))
    }

    /// Materializes every user table on scoped worker threads.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a worker panics.
    pub fn materialize_all(&self) -> LensResult<Vec<Arc<MaterializedTable>>> {
        let names = self.table_names();
        std::thread::scope(|scope| {
            let handles: Vec<_> = names
                .iter()
                .map(|name| scope.spawn(move || self.table(name)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| LensError::internal("materialization worker panicked"))?
                })
                .collect()
        })
    }
}

impl std::fmt::Debug for DataModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModel")
            .field("blob_len", &self.container.blob_len())
            .field("tables", &self.graph.tables.len())
            .field("cached", &self.cached_tables())
            .field("warnings", &self.warnings.len())
            .finish()
    }
}
