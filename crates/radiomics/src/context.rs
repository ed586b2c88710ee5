use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::{error::Result, features::FeatureRegistry, filters::FilterRegistry};

/// Process-lifetime state shared by every extraction: the filter and feature
/// registries plus the worker pool the (filter x class) grid runs on.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct ExtractionContext {
    filters: FilterRegistry,
    features: FeatureRegistry,
    pool: Arc<ThreadPool>,
}

impl ExtractionContext {
    /// Built-in registries and a pool sized to the available parallelism.
    pub fn new() -> Result<Self> {
        Self::with_workers(0)
    }

    /// Built-in registries and a pool of `workers` threads (0 = one per core).
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::with_registries(FilterRegistry::builtin(), FeatureRegistry::builtin(), workers)
    }

    pub fn with_registries(filters: FilterRegistry, features: FeatureRegistry, workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("radiomics-worker-{i}"))
            .build()?;
        debug!(workers = pool.current_num_threads(), "extraction context ready");
        Ok(Self {
            filters,
            features,
            pool: Arc::new(pool),
        })
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for ExtractionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("filters", &self.filters)
            .field("features", &self.features)
            .field("workers", &self.workers())
            .finish()
    }
}
