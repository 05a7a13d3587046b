//! Namespaced resource addressing.
//!
//! Identifiers of the form `@<module>/<resource>` point into another module's
//! resource tree. The same parse is shared by model lookups and view lookups
//! so one addressing syntax works everywhere.

pub const NAMESPACE_MARKER: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    /// `@module/resource` — resolved against the owning module's base path.
    Namespaced { module: &'a str, resource: &'a str },
    /// Anything else is treated as an already-resolved identifier and passed
    /// through unchanged.
    Plain(&'a str),
}

pub fn parse(identifier: &str) -> ResourceRef<'_> {
    let Some(rest) = identifier.strip_prefix(NAMESPACE_MARKER) else {
        return ResourceRef::Plain(identifier);
    };
    match rest.split_once('/') {
        Some((module, resource)) => ResourceRef::Namespaced { module, resource },
        None => ResourceRef::Namespaced {
            module: rest,
            resource: "",
        },
    }
}
