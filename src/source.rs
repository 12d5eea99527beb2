//! Template source resolution.
//!
//! Maps logical template names to backing files under the root directory and
//! owns the read boundary, so the engine itself never touches `std::fs`.

use std::io;
use std::path::{Path, PathBuf};

/// Conventional extension for template source files.
pub const TEMPLATE_EXT: &str = "html";

/// Read access to template sources.
///
/// Every load goes through this trait. Tests and alternative backends
/// (embedded assets, object stores) supply their own implementation.
pub trait FileStore: Send + Sync + 'static {
    /// Read the full contents of one template source.
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Default store reading straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Maps logical names to canonical cache keys and source paths.
///
/// A name and the same name with the conventional extension denote one
/// entity: `"a.html"` and `"a"` share a cache key. Directory nesting maps to
/// name segments, so `"admin/index"` resolves under `root/admin/`.
pub(crate) struct SourceResolver {
    root: PathBuf,
    suffix: String,
}

impl SourceResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suffix: format!(".{TEMPLATE_EXT}"),
        }
    }

    /// The cache key for `name`: the conventional extension stripped, if any.
    pub fn canonical<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(&self.suffix).unwrap_or(name)
    }

    /// The backing file path for a canonical name. Recomputed on demand,
    /// never cached.
    pub fn path_for(&self, canonical: &str) -> PathBuf {
        self.root.join(format!("{canonical}.{TEMPLATE_EXT}"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strips_extension() {
        let resolver = SourceResolver::new("templates");
        assert_eq!(resolver.canonical("index.html"), "index");
        assert_eq!(resolver.canonical("index"), "index");
    }

    #[test]
    fn test_canonical_keeps_other_suffixes() {
        let resolver = SourceResolver::new("templates");
        assert_eq!(resolver.canonical("index.htm"), "index.htm");
        assert_eq!(resolver.canonical("style.css"), "style.css");
    }

    #[test]
    fn test_path_for_nested_name() {
        let resolver = SourceResolver::new("templates");
        assert_eq!(
            resolver.path_for("admin/index"),
            Path::new("templates").join("admin/index.html")
        );
    }

    #[test]
    fn test_same_entity_resolves_to_same_path() {
        let resolver = SourceResolver::new("templates");
        let a = resolver.path_for(resolver.canonical("a.html"));
        let b = resolver.path_for(resolver.canonical("a"));
        assert_eq!(a, b);
    }
}
