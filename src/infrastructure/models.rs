use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::domain::address::{self, ResourceRef};
use crate::domain::error::ModelError;
use crate::domain::module::ModuleRegistry;
use crate::infrastructure::db::PgPool;

/// On-disk model definition, loaded from `<path>.json` or `<path>/model.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_primary_key() -> String {
    "id".into()
}

/// A data-access object bound to the shared pool. One instance exists per
/// requested name for the lifetime of the process.
pub struct Model {
    name: String,
    backing_path: PathBuf,
    descriptor: ModelDescriptor,
    pool: PgPool,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The concrete load path the requested name resolved to.
    pub fn backing_path(&self) -> &Path {
        &self.backing_path
    }

    pub fn table(&self) -> &str {
        &self.descriptor.table
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn select_sql(&self) -> String {
        let columns = if self.descriptor.columns.is_empty() {
            "*".to_string()
        } else {
            self.descriptor.columns.join(", ")
        };
        format!("SELECT {columns} FROM {}", self.descriptor.table)
    }

    pub async fn fetch_all(&self) -> sqlx::Result<Vec<sqlx::postgres::PgRow>> {
        sqlx::query(&self.select_sql()).fetch_all(&self.pool).await
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("backing_path", &self.backing_path)
            .field("table", &self.descriptor.table)
            .finish_non_exhaustive()
    }
}

/// Lazy model cache. Append-only; keys are the original requested names, not
/// the resolved paths.
#[derive(Default)]
pub struct ModelRegistry {
    cache: RwLock<HashMap<String, Arc<Model>>>,
}

impl ModelRegistry {
    pub fn get_or_load(
        &self,
        name: &str,
        modules: &ModuleRegistry,
        pool: Option<&PgPool>,
    ) -> Result<Arc<Model>, ModelError> {
        // Checked before any resolution is attempted.
        let Some(pool) = pool else {
            return Err(ModelError::NoPersistenceConfigured);
        };

        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(found.clone());
        }

        // Double-checked under the write lock; resolution and the descriptor
        // read happen while holding it, so a name is constructed at most once.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.get(name) {
            return Ok(found.clone());
        }
        let load_path = match address::parse(name) {
            ResourceRef::Namespaced { module, resource } => {
                modules.get_required(module)?.model_path().join(resource)
            }
            ResourceRef::Plain(path) => PathBuf::from(path),
        };
        let model = Arc::new(Self::load(name, &load_path, pool.clone())?);
        cache.insert(name.to_string(), model.clone());
        Ok(model)
    }

    fn load(name: &str, load_path: &Path, pool: PgPool) -> Result<Model, ModelError> {
        let descriptor_path =
            Self::descriptor_path(load_path).ok_or_else(|| ModelError::Load {
                path: load_path.to_path_buf(),
                source: anyhow::anyhow!("no model descriptor found"),
            })?;
        let raw = std::fs::read_to_string(&descriptor_path).map_err(|e| ModelError::Load {
            path: descriptor_path.clone(),
            source: e.into(),
        })?;
        let descriptor = serde_json::from_str(&raw).map_err(|e| ModelError::Load {
            path: descriptor_path.clone(),
            source: anyhow::Error::from(e),
        })?;
        Ok(Model {
            name: name.to_string(),
            backing_path: load_path.to_path_buf(),
            descriptor,
            pool,
        })
    }

    fn descriptor_path(load_path: &Path) -> Option<PathBuf> {
        if load_path.is_file() {
            return Some(load_path.to_path_buf());
        }
        let with_extension = load_path.with_extension("json");
        if with_extension.is_file() {
            return Some(with_extension);
        }
        let nested = load_path.join("model.json");
        if nested.is_file() {
            return Some(nested);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::config::DbConfig;
    use crate::domain::module::{ModuleRegistry, RegisteredModule, WebModule};
    use crate::infrastructure::db;
    use tempfile::TempDir;

    struct Fixture;

    impl WebModule for Fixture {
        fn name(&self) -> String {
            "shop".into()
        }

        fn model_path(&self, dirname: &Path) -> PathBuf {
            dirname.join("models")
        }
    }

    fn lazy_pool() -> PgPool {
        db::connect_lazy(&DbConfig {
            url: "postgres://localhost/unused".into(),
            max_connections: 1,
        })
        .unwrap()
    }

    fn registry_with_shop(root: &Path) -> ModuleRegistry {
        let mut modules = ModuleRegistry::new();
        modules
            .insert(RegisteredModule::new(
                Box::new(Fixture),
                "./shop".into(),
                root.to_path_buf(),
                root.to_path_buf(),
            ))
            .unwrap();
        modules
    }

    #[test]
    fn no_persistence_fails_before_resolution() {
        let models = ModelRegistry::default();
        let modules = ModuleRegistry::new();
        // the namespaced module is unknown, but persistence is checked first
        let err = models
            .get_or_load("@ghost/Item", &modules, None)
            .unwrap_err();
        assert!(matches!(err, ModelError::NoPersistenceConfigured));
    }

    #[tokio::test]
    async fn unknown_namespace_fails_with_unregistered_module() {
        let models = ModelRegistry::default();
        let modules = ModuleRegistry::new();
        let pool = lazy_pool();
        let err = models
            .get_or_load("@ghost/Item", &modules, Some(&pool))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnregisteredModule(_)));
    }

    #[tokio::test]
    async fn loads_caches_and_preserves_identity() {
        let root = TempDir::new().unwrap();
        let model_dir = root.path().join("models");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(
            model_dir.join("Item.json"),
            r#"{"table": "items", "columns": ["id", "label"]}"#,
        )
        .unwrap();

        let modules = registry_with_shop(root.path());
        let models = ModelRegistry::default();
        let pool = lazy_pool();

        let first = models
            .get_or_load("@shop/Item", &modules, Some(&pool))
            .unwrap();
        let second = models
            .get_or_load("@shop/Item", &modules, Some(&pool))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.backing_path(), model_dir.join("Item"));
        assert_eq!(first.table(), "items");
        assert_eq!(first.select_sql(), "SELECT id, label FROM items");
    }

    #[tokio::test]
    async fn concurrent_first_loads_construct_one_instance() {
        let root = TempDir::new().unwrap();
        let model_dir = root.path().join("models");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("Item.json"), r#"{"table": "items"}"#).unwrap();

        let modules = Arc::new(registry_with_shop(root.path()));
        let models = Arc::new(ModelRegistry::default());
        let pool = lazy_pool();

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let modules = modules.clone();
                let models = models.clone();
                let pool = pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    models.get_or_load("@shop/Item", &modules, Some(&pool)).unwrap()
                })
            })
            .collect();

        let loaded: Vec<Arc<Model>> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        for model in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], model));
        }
    }

    #[tokio::test]
    async fn missing_descriptor_is_a_load_error() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("models")).unwrap();

        let modules = registry_with_shop(root.path());
        let models = ModelRegistry::default();
        let pool = lazy_pool();

        let err = models
            .get_or_load("@shop/Missing", &modules, Some(&pool))
            .unwrap_err();
        assert!(matches!(err, ModelError::Load { .. }));
    }
}
