// Module layout (Clean Architecture style)
// - bootstrap: configuration, shared context, and the composition sequence
// - domain: module contracts, addressing, and the error taxonomy
// - infrastructure: path resolution, models, views, db, and logging adapters
// - presentation: HTTP middleware and terminal handlers

pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use bootstrap::config::Config;
pub use bootstrap::context::CompositionContext;
pub use bootstrap::orchestrator::{ComposedApp, Composer};
pub use domain::error::{
    ComposeError, InvalidModuleNameError, ModelError, ResolutionError, UnregisteredModuleError,
};
pub use domain::module::{ModuleRegistration, ModuleSource, WebModule};
