use std::path::{Path, PathBuf};

use crate::domain::error::ResolutionError;

/// Specifiers under this prefix are reserved for the application's own
/// modules and resolve against the application root.
pub const APP_MODULE_PREFIX: &str = "modules/";

/// Turns a module specifier into a concrete filesystem location.
///
/// Deterministic and side-effect-free beyond existence checks. Policy, tried
/// in order: the reserved application prefix, then syntactically path-like
/// specifiers against the base directory, then a package lookup across the
/// configured package roots.
pub struct ModulePathResolver {
    app_root: PathBuf,
    base_dir: PathBuf,
    package_roots: Vec<PathBuf>,
}

impl ModulePathResolver {
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        let app_root = app_root.into();
        let base_dir = app_root.clone();
        let package_roots = vec![app_root.join("vendor")];
        Self {
            app_root,
            base_dir,
            package_roots,
        }
    }

    /// Base directory path-like specifiers resolve against (defaults to the
    /// application root).
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_package_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.package_roots = roots;
        self
    }

    pub fn resolve(&self, specifier: &str) -> Result<PathBuf, ResolutionError> {
        if specifier.starts_with(APP_MODULE_PREFIX) {
            return Self::existing(self.app_root.join(specifier), specifier, &self.app_root);
        }

        if Self::is_path_like(specifier) {
            let candidate = if Path::new(specifier).is_absolute() {
                PathBuf::from(specifier)
            } else {
                self.base_dir.join(specifier)
            };
            return Self::existing(candidate, specifier, &self.base_dir);
        }

        // Package reference: first package root claiming the name wins.
        for root in &self.package_roots {
            let candidate = root.join(specifier);
            if candidate.exists() {
                return Self::existing(candidate, specifier, root);
            }
        }
        Err(ResolutionError {
            specifier: specifier.to_string(),
            searched: if self.package_roots.is_empty() {
                vec![self.app_root.clone()]
            } else {
                self.package_roots.clone()
            },
        })
    }

    fn is_path_like(specifier: &str) -> bool {
        specifier.starts_with("./")
            || specifier.starts_with("../")
            || Path::new(specifier).is_absolute()
    }

    fn existing(
        candidate: PathBuf,
        specifier: &str,
        searched: &Path,
    ) -> Result<PathBuf, ResolutionError> {
        if candidate.exists() {
            Ok(candidate.canonicalize().unwrap_or(candidate))
        } else {
            Err(ResolutionError {
                specifier: specifier.to_string(),
                searched: vec![searched.to_path_buf()],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(root: &TempDir) -> ModulePathResolver {
        ModulePathResolver::new(root.path())
    }

    #[test]
    fn app_prefix_resolves_against_the_root() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("modules/blog")).unwrap();

        let resolved = resolver(&root).resolve("modules/blog").unwrap();
        assert!(resolved.ends_with("modules/blog"));
        assert!(resolved.is_dir());
    }

    #[test]
    fn relative_specifiers_resolve_against_the_base_dir() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("widgets")).unwrap();

        let resolved = resolver(&root).resolve("./widgets").unwrap();
        assert!(resolved.is_dir());
    }

    #[test]
    fn package_references_search_the_package_roots() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("vendor/acme-auth")).unwrap();

        let resolved = resolver(&root).resolve("acme-auth").unwrap();
        assert!(resolved.ends_with("acme-auth"));
    }

    #[test]
    fn unresolvable_specifiers_name_the_specifier() {
        let root = TempDir::new().unwrap();
        let err = resolver(&root).resolve("./missing").unwrap_err();
        assert!(err.to_string().contains("./missing"));

        let err = resolver(&root).resolve("no-such-package").unwrap_err();
        assert!(err.to_string().contains("no-such-package"));
    }

    #[test]
    fn failed_package_lookup_reports_every_root() {
        let root = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();
        let resolver = ModulePathResolver::new(root.path()).with_package_roots(vec![
            root.path().join("vendor"),
            extra.path().to_path_buf(),
        ]);

        let err = resolver.resolve("no-such-package").unwrap_err();
        assert_eq!(err.searched.len(), 2);
        let rendered = err.to_string();
        assert!(rendered.contains(&root.path().join("vendor").display().to_string()));
        assert!(rendered.contains(&extra.path().display().to_string()));
    }
}
