//! Dataset reference resolution.
//!
//! A reference is joined onto the configured base directory and canonicalized
//! (following `..` and symlinks) before the containment check, so neither
//! relative segments nor links can reach outside the sandbox.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Client-facing rejection. Messages echo the caller's reference only, never
/// the resolved host path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("dataset reference {reference:?} escapes the dataset sandbox")]
    PathEscape { reference: String },
    #[error("dataset {reference:?} not found")]
    DatasetNotFound { reference: String },
}

#[derive(Debug, Clone)]
pub struct DatasetResolver {
    base: PathBuf,
}

impl DatasetResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `reference` to an existing directory strictly below the base.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        let base = self.base.canonicalize().map_err(|e| {
            warn!(base = %self.base.display(), error = %e, "dataset base directory unavailable");
            not_found(reference)
        })?;

        if Path::new(reference)
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            return Err(escape(reference));
        }

        let joined = base.join(reference);
        let resolved = match joined.canonicalize() {
            Ok(path) => path,
            Err(_) if escapes_lexically(Path::new(reference)) => return Err(escape(reference)),
            Err(_) => return Err(not_found(reference)),
        };

        if resolved == base || !resolved.starts_with(&base) {
            return Err(escape(reference));
        }
        if !resolved.is_dir() {
            return Err(not_found(reference));
        }

        debug!(reference, "dataset reference resolved");
        Ok(resolved)
    }
}

/// Whether `reference`, read without touching the file system, leaves the
/// directory it is joined onto or names that directory itself.
fn escapes_lexically(reference: &Path) -> bool {
    let mut depth = 0usize;
    for component in reference.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return true,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            Component::Normal(_) => depth += 1,
        }
    }
    depth == 0
}

fn escape(reference: &str) -> ResolveError {
    ResolveError::PathEscape {
        reference: reference.to_string(),
    }
}

fn not_found(reference: &str) -> ResolveError {
    ResolveError::DatasetNotFound {
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_escape_detection() {
        assert!(escapes_lexically(Path::new("../../etc")));
        assert!(escapes_lexically(Path::new("a/../../b")));
        assert!(escapes_lexically(Path::new("/etc")));
        assert!(escapes_lexically(Path::new("")));
        assert!(escapes_lexically(Path::new("a/..")));
        assert!(!escapes_lexically(Path::new("a/../b")));
        assert!(!escapes_lexically(Path::new("./a/b")));
    }

    #[test]
    fn errors_do_not_mention_host_paths() {
        let err = escape("../x");
        assert_eq!(
            err.to_string(),
            "dataset reference \"../x\" escapes the dataset sandbox"
        );
    }
}
