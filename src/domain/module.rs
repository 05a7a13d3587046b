use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::bootstrap::config::Config;
use crate::bootstrap::context::CompositionContext;
use crate::domain::error::{InvalidModuleNameError, UnregisteredModuleError};

static MODULE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Capability contract for a pluggable module.
///
/// A module contributes routes, views, static assets, and models under its own
/// name. The path-derived operations are computed from the registered
/// `dirname`, so overriding them is only needed when a module deviates from
/// the conventional sub-layout.
pub trait WebModule: Send + Sync {
    /// Stable name; used as the registry key and as the static-mount segment.
    fn name(&self) -> String;

    /// Base directory models resolve relative to.
    fn model_path(&self, dirname: &Path) -> PathBuf {
        dirname.to_path_buf()
    }

    /// Base directory for static assets.
    fn public_path(&self, dirname: &Path) -> PathBuf {
        dirname.join("public")
    }

    /// Base directory for templates.
    fn views_path(&self, dirname: &Path) -> PathBuf {
        dirname.join("views")
    }

    /// Routes to mount under the application's base path, or `None` when the
    /// module contributes none.
    fn routes(&self, _ctx: &CompositionContext) -> Option<Router> {
        None
    }
}

/// The synthesized main/fallback module: a plain value standing in for the
/// application's own root directory. Always registered, never statically
/// mounted under its own name.
pub struct MainModule {
    name: String,
}

impl MainModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl WebModule for MainModule {
    fn name(&self) -> String {
        self.name.clone()
    }
}

/// A module as registered by the orchestrator: the descriptor plus the
/// locations fixed at registration time. Derived resource paths are computed
/// from `dirname` on demand rather than stored.
pub struct RegisteredModule {
    name: String,
    specifier: String,
    resolved_path: PathBuf,
    dirname: PathBuf,
    inner: Box<dyn WebModule>,
}

impl RegisteredModule {
    pub(crate) fn new(
        inner: Box<dyn WebModule>,
        specifier: String,
        resolved_path: PathBuf,
        dirname: PathBuf,
    ) -> Self {
        let name = inner.name();
        Self {
            name,
            specifier,
            resolved_path,
            dirname,
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The specifier this module was discovered under. Kept for diagnostics.
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    pub fn dirname(&self) -> &Path {
        &self.dirname
    }

    pub fn model_path(&self) -> PathBuf {
        self.inner.model_path(&self.dirname)
    }

    pub fn public_path(&self) -> PathBuf {
        self.inner.public_path(&self.dirname)
    }

    pub fn views_path(&self) -> PathBuf {
        self.inner.views_path(&self.dirname)
    }

    pub fn routes(&self, ctx: &CompositionContext) -> Option<Router> {
        self.inner.routes(ctx)
    }
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("name", &self.name)
            .field("specifier", &self.specifier)
            .field("resolved_path", &self.resolved_path)
            .field("dirname", &self.dirname)
            .finish_non_exhaustive()
    }
}

/// Name → module mapping plus registration order. Written only during
/// composition; shared read-only behind an `Arc` afterwards.
#[derive(Default)]
pub struct ModuleRegistry {
    by_name: HashMap<String, Arc<RegisteredModule>>,
    order: Vec<String>,
}

impl ModuleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a module. Names that cannot serve as a mount segment are
    /// rejected. A duplicate name overwrites the previous entry (last
    /// registration wins) while keeping its original mount position.
    pub(crate) fn insert(
        &mut self,
        module: RegisteredModule,
    ) -> Result<(), InvalidModuleNameError> {
        let name = module.name().to_string();
        if !MODULE_NAME_RE.is_match(&name) {
            return Err(InvalidModuleNameError(name));
        }
        if self.by_name.insert(name.clone(), Arc::new(module)).is_some() {
            tracing::warn!(module = name.as_str(), "module_name_overwritten");
        } else {
            self.order.push(name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredModule>> {
        self.by_name.get(name).cloned()
    }

    pub fn get_required(&self, name: &str) -> Result<Arc<RegisteredModule>, UnregisteredModuleError> {
        self.get(name)
            .ok_or_else(|| UnregisteredModuleError(name.to_string()))
    }

    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredModule>> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

type ModuleCtor = Box<dyn Fn(&Config) -> anyhow::Result<Box<dyn WebModule>> + Send + Sync>;

/// One discovered module: the specifier locating its resources on disk, paired
/// with the constructor producing its descriptor. The host has no dynamic code
/// loading, so the registration source supplies both.
pub struct ModuleRegistration {
    pub specifier: String,
    ctor: ModuleCtor,
}

impl ModuleRegistration {
    pub fn new<F>(specifier: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&Config) -> anyhow::Result<Box<dyn WebModule>> + Send + Sync + 'static,
    {
        Self {
            specifier: specifier.into(),
            ctor: Box::new(ctor),
        }
    }

    pub(crate) fn construct(&self, cfg: &Config) -> anyhow::Result<Box<dyn WebModule>> {
        (self.ctor)(cfg)
    }
}

/// Registration source consulted once at the start of composition. The order
/// of the returned list is the registration order and therefore the
/// route-mounting order.
pub trait ModuleSource {
    fn register_modules(&self) -> Vec<ModuleRegistration>;
}

/// Default source: no modules beyond the synthesized main module.
pub struct NoModules;

impl ModuleSource for NoModules {
    fn register_modules(&self) -> Vec<ModuleRegistration> {
        Vec::new()
    }
}

impl<F> ModuleSource for F
where
    F: Fn() -> Vec<ModuleRegistration>,
{
    fn register_modules(&self) -> Vec<ModuleRegistration> {
        (self)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixture {
        name: &'static str,
    }

    impl WebModule for Fixture {
        fn name(&self) -> String {
            self.name.into()
        }
    }

    fn registered(name: &'static str, dirname: &str) -> RegisteredModule {
        RegisteredModule::new(
            Box::new(Fixture { name }),
            format!("./{name}"),
            PathBuf::from(dirname),
            PathBuf::from(dirname),
        )
    }

    #[test]
    fn derived_paths_follow_dirname() {
        let module = registered("blog", "/srv/app/blog");
        assert_eq!(module.model_path(), PathBuf::from("/srv/app/blog"));
        assert_eq!(module.public_path(), PathBuf::from("/srv/app/blog/public"));
        assert_eq!(module.views_path(), PathBuf::from("/srv/app/blog/views"));
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.insert(registered("alpha", "/a")).unwrap();
        registry.insert(registered("beta", "/b")).unwrap();
        registry.insert(registered("gamma", "/c")).unwrap();

        let names: Vec<&str> = registry.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["alpha", "beta", "gamma"]);
    }

    #[test]
    fn duplicate_name_last_wins_in_place() {
        let mut registry = ModuleRegistry::new();
        registry.insert(registered("alpha", "/a")).unwrap();
        registry.insert(registered("beta", "/b")).unwrap();
        registry.insert(registered("alpha", "/a2")).unwrap();

        let names: Vec<&str> = registry.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["alpha", "beta"]);
        assert_eq!(
            registry.get("alpha").unwrap().dirname(),
            PathBuf::from("/a2").as_path()
        );
    }

    #[test]
    fn unmountable_names_are_rejected() {
        let mut registry = ModuleRegistry::new();
        let err = registry.insert(registered("", "/a")).unwrap_err();
        assert_eq!(err.to_string(), "module name '' is not mountable");
        assert!(registry.insert(registered("a/b", "/b")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_module_is_an_error() {
        let registry = ModuleRegistry::new();
        let err = registry.get_required("ghost").unwrap_err();
        assert_eq!(err.to_string(), "unregistered module: 'ghost'");
    }
}
