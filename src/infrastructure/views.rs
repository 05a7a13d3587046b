use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::address::{self, ResourceRef};
use crate::domain::error::UnregisteredModuleError;
use crate::domain::module::ModuleRegistry;

const DEFAULT_VIEW_EXTENSION: &str = "html";

/// Path-search contract handed to the template engine: given a requested
/// template identifier, produce the concrete file to render, or `None` when
/// nothing claims it (the engine reports its own not-found condition).
pub trait TemplateLocator: Send + Sync {
    fn locate(&self, name: &str) -> Result<Option<PathBuf>, UnregisteredModuleError>;
}

/// Search-path provider over the registered modules plus a fixed list of
/// application view roots. Stateless across calls; existence checks are
/// synchronous.
pub struct ViewResolver {
    roots: Vec<PathBuf>,
    modules: Arc<ModuleRegistry>,
}

impl ViewResolver {
    pub fn new(roots: Vec<PathBuf>, modules: Arc<ModuleRegistry>) -> Self {
        Self { roots, modules }
    }

    pub fn locate(&self, name: &str) -> Result<Option<PathBuf>, UnregisteredModuleError> {
        match address::parse(name) {
            ResourceRef::Namespaced { module, resource } => {
                let owner = self.modules.get_required(module)?;
                Ok(Self::first_existing(owner.views_path().join(resource)))
            }
            ResourceRef::Plain(relative) => {
                for root in &self.roots {
                    if let Some(found) = Self::first_existing(root.join(relative)) {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }

    fn first_existing(candidate: PathBuf) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate);
        }
        if candidate.extension().is_none() {
            let with_extension = candidate.with_extension(DEFAULT_VIEW_EXTENSION);
            if with_extension.is_file() {
                return Some(with_extension);
            }
        }
        None
    }
}

impl TemplateLocator for ViewResolver {
    fn locate(&self, name: &str) -> Result<Option<PathBuf>, UnregisteredModuleError> {
        ViewResolver::locate(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{RegisteredModule, WebModule};
    use tempfile::TempDir;

    struct Fixture;

    impl WebModule for Fixture {
        fn name(&self) -> String {
            "blog".into()
        }
    }

    fn resolver(app_root: &TempDir, module_root: &TempDir) -> ViewResolver {
        let mut modules = ModuleRegistry::new();
        modules
            .insert(RegisteredModule::new(
                Box::new(Fixture),
                "./blog".into(),
                module_root.path().to_path_buf(),
                module_root.path().to_path_buf(),
            ))
            .unwrap();
        ViewResolver::new(vec![app_root.path().join("views")], Arc::new(modules))
    }

    #[test]
    fn namespaced_names_resolve_into_the_module_views_root() {
        let app = TempDir::new().unwrap();
        let blog = TempDir::new().unwrap();
        let views = blog.path().join("views");
        std::fs::create_dir_all(&views).unwrap();
        std::fs::write(views.join("index.html"), "<html></html>").unwrap();

        let resolver = resolver(&app, &blog);
        let found = resolver.locate("@blog/index").unwrap().unwrap();
        assert_eq!(found, views.join("index.html"));

        // and exactly the same path as a manual join
        let explicit = resolver.locate("@blog/index.html").unwrap().unwrap();
        assert_eq!(explicit, found);
    }

    #[test]
    fn unregistered_namespace_is_an_error() {
        let app = TempDir::new().unwrap();
        let blog = TempDir::new().unwrap();
        let err = resolver(&app, &blog).locate("@ghost/index").unwrap_err();
        assert_eq!(err.0, "ghost");
    }

    #[test]
    fn plain_names_fall_back_to_the_application_roots() {
        let app = TempDir::new().unwrap();
        let blog = TempDir::new().unwrap();
        let views = app.path().join("views");
        std::fs::create_dir_all(&views).unwrap();
        std::fs::write(views.join("error.html"), "oops").unwrap();

        let found = resolver(&app, &blog).locate("error").unwrap().unwrap();
        assert_eq!(found, views.join("error.html"));
    }

    #[test]
    fn unclaimed_names_are_not_an_error() {
        let app = TempDir::new().unwrap();
        let blog = TempDir::new().unwrap();
        assert!(resolver(&app, &blog).locate("nowhere").unwrap().is_none());
    }
}
