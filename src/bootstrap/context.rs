use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bootstrap::config::Config;
use crate::domain::error::{ModelError, UnregisteredModuleError};
use crate::domain::module::{ModuleRegistry, RegisteredModule};
use crate::infrastructure::db::PgPool;
use crate::infrastructure::logging::AppLogger;
use crate::infrastructure::models::{Model, ModelRegistry};
use crate::infrastructure::views::ViewResolver;

/// Shared composition state: written once by the orchestrator during startup,
/// read by request handlers afterwards. Cheap to clone.
#[derive(Clone)]
pub struct CompositionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cfg: Config,
    root: PathBuf,
    modules: Arc<ModuleRegistry>,
    models: ModelRegistry,
    pool: Option<PgPool>,
    views: ViewResolver,
    logger: AppLogger,
    development: bool,
}

impl CompositionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: Config,
        root: PathBuf,
        modules: Arc<ModuleRegistry>,
        pool: Option<PgPool>,
        views: ViewResolver,
        logger: AppLogger,
        development: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cfg,
                root,
                modules,
                models: ModelRegistry::default(),
                pool,
                views,
                logger,
                development,
            }),
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.inner.cfg
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.inner.modules
    }

    pub fn module(&self, name: &str) -> Result<Arc<RegisteredModule>, UnregisteredModuleError> {
        self.inner.modules.get_required(name)
    }

    /// Lazily instantiates and caches the named model. Namespaced names
    /// (`@module/Name`) resolve against the owning module's model base.
    pub fn model(&self, name: &str) -> Result<Arc<Model>, ModelError> {
        self.inner
            .models
            .get_or_load(name, &self.inner.modules, self.inner.pool.as_ref())
    }

    pub fn db(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    pub fn views(&self) -> &ViewResolver {
        &self.inner.views
    }

    pub fn logger(&self) -> &AppLogger {
        &self.inner.logger
    }

    pub fn is_development(&self) -> bool {
        self.inner.development
    }
}
