//! Model sessions.
//!
//! A [`Session`] holds at most one current model. Starting a load drops
//! the current model before any decoding begins, and a load that another
//! load has overtaken is discarded with `Superseded` when it completes.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use semlens_common::{LensError, LensResult};
use tracing::{debug, info};

use crate::loader::ModelLoader;
use crate::model::DataModel;

/// Holds the current model and orders overlapping loads.
pub struct Session {
    loader: ModelLoader,
    /// Generation of the most recently started load.
    generation: AtomicU64,
    current: Mutex<Option<Arc<DataModel>>>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            loader,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Returns the loader.
    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Returns the generation of the most recently started load.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Returns the current model, if one is loaded.
    pub fn current(&self) -> Option<Arc<DataModel>> {
        self.current.lock().clone()
    }

    /// Drops the current model and invalidates loads in flight.
    pub fn close(&self) {
        let generation = self.begin();
        debug!(generation, "session closed");
    }

    /// Loads a package, replacing the current model.
    ///
    /// # Errors
    ///
    /// Returns `Superseded` if another load started before this one
    /// finished, otherwise the loader's error.
    pub async fn load(&self, package: Bytes) -> LensResult<Arc<DataModel>> {
        let generation = self.begin();
        self.finish(generation, self.loader.load(package)).await
    }

    /// Loads a package file, replacing the current model.
    ///
    /// # Errors
    ///
    /// As [`Self::load`], plus `Io` if the file cannot be read.
    pub async fn load_path(&self, path: &Path) -> LensResult<Arc<DataModel>> {
        let generation = self.begin();
        self.finish(generation, self.loader.load_path(path)).await
    }

    /// Starts a new generation and releases the current model.
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.current.lock().take();
        if previous.is_some() {
            debug!(generation, "released previous model");
        }
        generation
    }

    async fn finish<F>(&self, generation: u64, load: F) -> LensResult<Arc<DataModel>>
    where
        F: Future<Output = LensResult<DataModel>>,
    {
        let result = load.await;

        let mut current = self.current.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding superseded load");
            return Err(LensError::Superseded { generation });
        }
        let model = Arc::new(result?);
        *current = Some(Arc::clone(&model));
        info!(generation, "model installed");
        Ok(model)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation())
            .field("loaded", &self.current.lock().is_some())
            .finish()
    }
}
