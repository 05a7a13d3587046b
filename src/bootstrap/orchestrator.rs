use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use serde_json::Value;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::bootstrap::config::{self, Config};
use crate::bootstrap::context::CompositionContext;
use crate::domain::error::ComposeError;
use crate::domain::module::{
    MainModule, ModuleRegistration, ModuleRegistry, ModuleSource, NoModules, RegisteredModule,
};
use crate::infrastructure::db;
use crate::infrastructure::logging::AppLogger;
use crate::infrastructure::resolve::ModulePathResolver;
use crate::infrastructure::views::ViewResolver;
use crate::presentation::http::errors;
use crate::presentation::http::session::{self, SessionConfig};

const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The top-level sequencer: turns configuration and discovered modules into a
/// running application.
///
/// Startup is linear and monotonic — discovery, config resolution, module
/// instantiation, subsystem wiring, route mounting, terminal handlers. Any
/// failure aborts the whole sequence; there is no partial application.
pub struct Composer {
    root: PathBuf,
    overrides: Value,
    source: Box<dyn ModuleSource>,
    package_roots: Option<Vec<PathBuf>>,
    body_limit: usize,
}

/// A fully composed application: the router to serve and the shared context.
pub struct ComposedApp {
    pub router: Router,
    pub ctx: CompositionContext,
}

impl fmt::Debug for ComposedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedApp")
            .field("modules", &self.ctx.modules().len())
            .field("base_path", &self.ctx.cfg().base_path)
            .finish_non_exhaustive()
    }
}

impl Composer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: Value::Object(Default::default()),
            source: Box::new(NoModules),
            package_roots: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_config(mut self, overrides: Value) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_package_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.package_roots = Some(roots);
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn compose(self) -> Result<ComposedApp, ComposeError> {
        let Composer {
            root,
            overrides,
            source,
            package_roots,
            body_limit,
        } = self;

        let registrations = source.register_modules();
        debug!(count = registrations.len(), "modules_discovered");

        let cfg = Config::resolve(&overrides).map_err(ComposeError::Config)?;
        debug!(
            base_path = cfg.base_path.as_str(),
            main_module = cfg.main_module_name.as_str(),
            db = cfg.db.is_some(),
            "config_resolved"
        );

        let modules = Arc::new(instantiate_modules(
            &root,
            package_roots,
            &cfg,
            registrations,
        )?);

        // Subsystems, wired in order: persistence, logging, views.
        let pool = match cfg.db.as_ref() {
            Some(db_cfg) => Some(db::connect_lazy(db_cfg).map_err(ComposeError::Persistence)?),
            None => None,
        };
        let logger = AppLogger::new(pool.clone());
        let views = ViewResolver::new(vec![root.join("views")], modules.clone());
        let development = config::development_env();
        let ctx = CompositionContext::new(cfg, root, modules, pool, views, logger, development);

        let router = build_router(&ctx, body_limit);
        info!(modules = ctx.modules().len(), "composition_ready");
        Ok(ComposedApp { router, ctx })
    }
}

fn instantiate_modules(
    root: &Path,
    package_roots: Option<Vec<PathBuf>>,
    cfg: &Config,
    registrations: Vec<ModuleRegistration>,
) -> Result<ModuleRegistry, ComposeError> {
    let mut registry = ModuleRegistry::new();

    // The main/fallback module is registered first and stands in for the
    // application root itself.
    registry.insert(RegisteredModule::new(
        Box::new(MainModule::new(cfg.main_module_name.clone())),
        ".".into(),
        root.to_path_buf(),
        root.to_path_buf(),
    ))?;

    let mut resolver = ModulePathResolver::new(root);
    if let Some(roots) = package_roots {
        resolver = resolver.with_package_roots(roots);
    }

    for registration in registrations {
        let resolved = resolver.resolve(&registration.specifier)?;
        let module = registration
            .construct(cfg)
            .map_err(|source| ComposeError::Load {
                specifier: registration.specifier.clone(),
                source,
            })?;
        let dirname = if resolved.is_dir() {
            resolved.clone()
        } else {
            resolved
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf())
        };
        debug!(
            specifier = registration.specifier.as_str(),
            path = %resolved.display(),
            "module_resolved"
        );
        registry.insert(RegisteredModule::new(
            module,
            registration.specifier,
            resolved,
            dirname,
        ))?;
    }

    Ok(registry)
}

fn build_router(ctx: &CompositionContext, body_limit: usize) -> Router {
    let cfg = ctx.cfg();
    let not_found_router = Router::new().fallback(errors::not_found);

    // One static mount per non-main module; the main module's assets are
    // served from the application root instead.
    let mut app = Router::new();
    for module in ctx.modules().iter() {
        if module.name() == cfg.main_module_name {
            continue;
        }
        let serve =
            ServeDir::new(module.public_path()).not_found_service(not_found_router.clone());
        app = app.nest_service(&format!("/{}", module.name()), serve);
    }

    // Route mounting follows registration order.
    let mut mounted: Vec<Router> = Vec::new();
    for module in ctx.modules().iter() {
        match module.routes(ctx) {
            Some(routes) => {
                debug!(module = module.name(), "routes_mounted");
                mounted.push(routes);
            }
            None => debug!(module = module.name(), "module_contributes_no_routes"),
        }
    }

    // Terminal tail: root public assets, then the catch-all not-found handler.
    let tail: Router = Router::new().fallback_service(
        ServeDir::new(ctx.root().join("public")).not_found_service(not_found_router.clone()),
    );

    // Earlier modules win on overlapping paths: each router falls back to the
    // rest of the chain.
    let base_path = normalize_base_path(&cfg.base_path);
    let chain = if base_path == "/" {
        let mut chain = tail;
        for routes in mounted.into_iter().rev() {
            chain = routes.fallback_service(chain);
        }
        chain
    } else if mounted.is_empty() {
        tail
    } else {
        let mut module_chain = not_found_router;
        for routes in mounted.into_iter().rev() {
            module_chain = routes.fallback_service(module_chain);
        }
        Router::new()
            .nest_service(&base_path, module_chain)
            .fallback_service(tail)
    };
    let mut app = app.fallback_service(chain);

    // Baseline middleware, always on.
    app = app.layer(DefaultBodyLimit::max(body_limit));
    app = app.layer(
        TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
            let method = request.method().clone();
            let uri = request.uri().clone();
            tracing::info_span!("http", %method, %uri)
        }),
    );

    // Session/flash support only with a signing secret.
    if let Some(secret) = cfg.secret.clone() {
        app = app.layer(middleware::from_fn_with_state(
            SessionConfig::new(secret),
            session::session_middleware,
        ));
    }

    // The terminal error renderer stays outermost.
    app.layer(middleware::from_fn_with_state(
        ctx.clone(),
        errors::render_errors,
    ))
}

fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_paths_are_normalized() {
        assert_eq!(normalize_base_path("/"), "/");
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(normalize_base_path("/app/"), "/app");
        assert_eq!(normalize_base_path("app"), "/app");
    }
}
