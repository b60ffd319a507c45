// Best-effort source lookup when a stop lands in a class with no mapping

use std::path::PathBuf;

/// Asked to locate the source file for a PL/SQL object when the session has
/// no mapping for the class a stop landed in. The front end may answer with
/// a path (which the session then loads and scans) or decline.
pub trait SourceResolver: Send + Sync {
    /// `object_name` is the bare PL/SQL object name, e.g. `HELLO`.
    fn resolve(&self, object_name: &str) -> Option<PathBuf>;
}

/// Resolves nothing; the stop is still reported against the last loaded
/// source.
#[derive(Debug, Default)]
pub struct NoopResolver;

impl SourceResolver for NoopResolver {
    fn resolve(&self, _object_name: &str) -> Option<PathBuf> {
        None
    }
}
