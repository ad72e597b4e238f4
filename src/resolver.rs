//! Request path grammar.
//!
//! A request path is relative to the configured root. A double slash
//! separates the location of an archive file from a path inside it:
//!
//! ```text
//! comics/vol1                      plain directory
//! comics/vol1.zip//chapter2/       directory inside an archive
//! comics/vol1.zip//chapter2/01.png file inside an archive
//! ```
//!
//! Only the first `//` is significant; the in-archive part may contain any
//! further slashes. Joining never leaves the root.

use std::path::{Component, Path, PathBuf};

use crate::archive::normalize_inner_path;
use crate::error::{Error, Result};

/// Delimiter between the archive location and the in-archive path.
pub const ARCHIVE_DELIMITER: &str = "//";

/// Where a request path points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A plain filesystem location under the root
    Directory(PathBuf),
    /// A location inside an archive file
    InArchive {
        /// Root-joined path of the archive file
        archive: PathBuf,
        /// Normalized in-archive path, `""` for the archive root
        inner: String,
    },
}

/// Maps request paths onto the served root.
///
/// Resolution is purely lexical: nothing is read from disk, and whether the
/// resulting path exists is left to the caller.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for `root`, which should already be canonical.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory every request path is joined onto.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify a percent-decoded request path.
    pub fn resolve(&self, request: &str) -> Result<ResolvedPath> {
        match request.split_once(ARCHIVE_DELIMITER) {
            None => Ok(ResolvedPath::Directory(self.join(request, request)?)),
            Some((archive, inner)) => {
                let (archive, inner) = self.split_archive(request, archive, inner)?;
                Ok(ResolvedPath::InArchive { archive, inner })
            }
        }
    }

    /// Resolve a path that must address something inside an archive.
    pub fn resolve_archive_entry(&self, request: &str) -> Result<(PathBuf, String)> {
        let (archive, inner) = request
            .split_once(ARCHIVE_DELIMITER)
            .ok_or_else(|| Error::path(request, "expected '//' between archive and entry"))?;
        self.split_archive(request, archive, inner)
    }

    fn split_archive(&self, request: &str, archive: &str, inner: &str) -> Result<(PathBuf, String)> {
        if archive.split('/').all(|s| s.is_empty() || s == ".") {
            return Err(Error::path(request, "missing archive location before '//'"));
        }
        let archive = self.join(request, archive)?;
        Ok((archive, normalize_inner_path(inner)))
    }

    /// Join a root-relative path, rejecting anything that could escape the root.
    fn join(&self, request: &str, relative: &str) -> Result<PathBuf> {
        let mut joined = self.root.clone();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if segment.contains('\\') {
                return Err(Error::path(request, "backslash in path segment"));
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => joined.push(part),
                (Some(Component::ParentDir), _) => {
                    return Err(Error::path(request, "'..' is not allowed"));
                }
                _ => return Err(Error::path(request, "invalid path segment")),
            }
        }
        Ok(joined)
    }
}
