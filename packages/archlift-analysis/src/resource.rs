//! Project resource access for inspectors.
//!
//! Paths use forward slashes relative to the project root. A `#` separator
//! addresses an entry inside an archive (`lib/app.jar#com/x/Y.class`); the
//! filesystem resolver shipped here serves plain files only, an
//! archive-backed resolver is a drop-in behind the same trait.

use crate::error::{AnalysisError, Result};
use std::path::{Path, PathBuf};

pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<Vec<u8>>;
}

pub struct FsResourceResolver {
    root: PathBuf,
}

impl FsResourceResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceResolver for FsResourceResolver {
    fn resolve(&self, path: &str) -> Result<Vec<u8>> {
        if path.contains('#') {
            return Err(AnalysisError::ResourceNotFound(format!(
                "archive entries are not served by the filesystem resolver: {}",
                path
            )));
        }
        let full = self.root.join(path);
        std::fs::read(&full)
            .map_err(|_| AnalysisError::ResourceNotFound(full.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        assert_eq!(resolver.resolve("a.txt").unwrap(), b"hello");
        assert!(resolver.resolve("missing.txt").is_err());
    }

    #[test]
    fn test_archive_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        assert!(resolver.resolve("lib/app.jar#com/x/Y.class").is_err());
    }
}
