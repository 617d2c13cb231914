use std::sync::Arc;

use crate::classifiers::ClassifierRegistry;
use crate::core::{Pool, PoolConfig};
use crate::status::{Reporter, ReporterSet};

/// Builder for constructing a [`Pool`] with optional collaborators.
pub struct PoolBuilder {
    cfg: PoolConfig,
    registry: Option<Arc<ClassifierRegistry>>,
    reporters: Vec<Arc<dyn Reporter>>,
}

impl PoolBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            registry: None,
            reporters: Vec::new(),
        }
    }

    /// Sets the classifier registry consulted on admission.
    ///
    /// The registry is shared: classifiers registered on it after `build`
    /// are visible to the pool.
    pub fn with_registry(mut self, registry: Arc<ClassifierRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a status reporter.
    ///
    /// With more than one reporter the pool feeds them through a
    /// [`ReporterSet`].
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Builds and returns the pool.
    ///
    /// With more than one reporter this must run inside a tokio runtime,
    /// since the [`ReporterSet`] spawns its workers here.
    pub fn build(mut self) -> Pool {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ClassifierRegistry::new()));

        let reporter: Option<Arc<dyn Reporter>> = match self.reporters.len() {
            0 => None,
            1 => self.reporters.pop(),
            _ => Some(Arc::new(ReporterSet::new(self.reporters))),
        };

        Pool::from_parts(self.cfg, registry, reporter)
    }
}
