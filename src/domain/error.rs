use std::path::PathBuf;

/// Raised when a module specifier maps to no existing path. Fatal during
/// composition: the orchestrator never starts a partial application.
#[derive(Debug, thiserror::Error)]
#[error("unable to resolve module '{specifier}': no matching path under {}", searched_display(.searched))]
pub struct ResolutionError {
    pub specifier: String,
    /// Every location that was tried, in lookup order.
    pub searched: Vec<PathBuf>,
}

fn searched_display(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The module name cannot serve as a registry key or static-mount segment.
#[derive(Debug, thiserror::Error)]
#[error("module name '{0}' is not mountable")]
pub struct InvalidModuleNameError(pub String);

/// A namespaced reference (`@module/...`) named a module that is not in the
/// registry. Raised synchronously at the call site, for both model and view
/// lookups.
#[derive(Debug, thiserror::Error)]
#[error("unregistered module: '{0}'")]
pub struct UnregisteredModuleError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot create a model without db configuration")]
    NoPersistenceConfigured,
    #[error(transparent)]
    UnregisteredModule(#[from] UnregisteredModuleError),
    #[error("failed to load model descriptor at {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    InvalidName(#[from] InvalidModuleNameError),
    #[error("module '{specifier}' failed to construct")]
    Load {
        specifier: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid configuration")]
    Config(#[source] anyhow::Error),
    #[error("failed to initialize persistence")]
    Persistence(#[source] anyhow::Error),
}
