//! Filesystem-existence oracle consumed by stack detection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::stack::normalized;

/// Answers "does this path exist at the project root?".
///
/// Production code uses [`FsOracle`]; tests use [`MemoryOracle`] or a
/// mockall-generated mock.
#[cfg_attr(test, mockall::automock)]
pub trait FileOracle: Send + Sync {
    /// `path` is relative to the project root.
    fn exists(&self, path: &Path) -> bool;
}

/// Oracle backed by the real filesystem.
#[derive(Debug, Clone)]
pub struct FsOracle {
    root: PathBuf,
}

impl FsOracle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileOracle for FsOracle {
    fn exists(&self, path: &Path) -> bool {
        let full = self.root.join(path);
        let exists = full.exists();
        tracing::trace!(path = %full.display(), exists, "marker path checked");
        exists
    }
}

/// In-memory oracle over a fixed set of relative paths.
///
/// Parent directories of every listed path also exist, so listing
/// `src/main.rs` makes `src` visible too.
///
/// # Examples
///
/// ```
/// use dockerize_core::{FileOracle, MemoryOracle};
/// use std::path::Path;
///
/// let oracle = MemoryOracle::new(["package.json", "apps/web/package.json"]);
/// assert!(oracle.exists(Path::new("package.json")));
/// assert!(oracle.exists(Path::new("apps/web")));
/// assert!(!oracle.exists(Path::new("composer.json")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryOracle {
    paths: BTreeSet<PathBuf>,
}

impl MemoryOracle {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths.into_iter().collect()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(path.into());
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for MemoryOracle {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileOracle for MemoryOracle {
    fn exists(&self, path: &Path) -> bool {
        let path = normalized(path);
        self.paths.iter().any(|p| normalized(p).starts_with(&path))
    }
}
