//! Archive backends behind one browsing interface.
//!
//! Every supported container format implements [`ArchiveBackend`]. The
//! format of a file on disk is sniffed from its content (see [`format`]),
//! never from its extension, and [`open_archive`] builds the matching
//! backend.
//!
//! In-archive paths are slash delimited, with `""` naming the archive
//! root. Leading, trailing and repeated slashes carry no meaning, so
//! `"sub"`, `"sub/"` and `"/sub//"` all name the same directory.

pub mod format;
mod sevenzip;
mod zipfile;

pub use format::ArchiveFormat;
pub use sevenzip::SevenZipArchive;
pub use zipfile::ZipArchive;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::vfs::VirtualListing;

/// A readable stream over one entry's decompressed content.
pub type EntryReader = Box<dyn AsyncRead + Send + Unpin>;

/// Whether an entry is a file or a directory marker.
///
/// Backends decide this from their own metadata (zip attributes, 7z
/// attribute flags); names alone are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Readable with [`ArchiveBackend::open_file`]
    File,
    /// Listed under `dirs`, never opened
    Directory,
}

/// One item of an archive's namespace, normalized across formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized path: `/` separated, no empty segments, no trailing slash
    pub path: String,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    /// Build an entry from a name as the archive stores it. Backslashes
    /// become slashes and the path is normalized.
    pub fn new(raw_path: &str, kind: EntryKind) -> Self {
        Self {
            path: normalize_inner_path(&raw_path.replace('\\', "/")),
            kind,
        }
    }

    /// Split into (parent directory, name). Root-level entries have an empty parent.
    pub fn split(&self) -> (&str, &str) {
        match self.path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", self.path.as_str()),
        }
    }
}

/// An opened archive, ready to answer listing and read calls.
///
/// Handles are read-only and shared between concurrent requests.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Container format this backend reads
    fn format(&self) -> ArchiveFormat;

    /// Every entry of the archive, in archive order
    fn entries(&self) -> &[ArchiveEntry];

    /// Immediate children of `dir`.
    ///
    /// An unknown directory yields an empty listing rather than an error.
    fn list_directory(&self, dir: &str) -> VirtualListing {
        list_children(self.entries(), dir)
    }

    /// Open a reader at the start of the file entry named `path`.
    async fn open_file(&self, path: &str) -> Result<EntryReader>;
}

/// Settings shared by every backend.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Program used to index and decode 7z archives
    pub seven_zip_program: OsString,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            seven_zip_program: OsString::from("7z"),
        }
    }
}

/// Sniff `path` and open it with the matching backend.
pub async fn open_archive(path: &Path, options: &BackendOptions) -> Result<Arc<dyn ArchiveBackend>> {
    let format = ArchiveFormat::sniff(path)
        .await?
        .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
    tracing::debug!("Sniffed {:?} as {}", path, format);

    let backend: Arc<dyn ArchiveBackend> = match format {
        ArchiveFormat::Zip => Arc::new(ZipArchive::open(path).await?),
        ArchiveFormat::SevenZip => {
            Arc::new(SevenZipArchive::open(path, &options.seven_zip_program).await?)
        }
    };
    Ok(backend)
}

/// Drop empty and `.` segments and rejoin with single slashes.
pub fn normalize_inner_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Children of `dir` among `entries`.
///
/// Directories are also inferred from deeper entry paths, since not every
/// archive stores explicit directory records.
pub fn list_children(entries: &[ArchiveEntry], dir: &str) -> VirtualListing {
    let dir = normalize_inner_path(dir);
    let mut files = Vec::new();
    let mut dirs = BTreeSet::new();

    for entry in entries {
        let (parent, name) = entry.split();
        if name.is_empty() {
            continue;
        }
        if parent == dir {
            match entry.kind {
                EntryKind::File => files.push(name.to_string()),
                EntryKind::Directory => {
                    dirs.insert(name.to_string());
                }
            }
            continue;
        }

        // Deeper entry: its first segment below `dir` is an implicit directory
        let below = if dir.is_empty() {
            Some(entry.path.as_str())
        } else {
            entry
                .path
                .strip_prefix(dir.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        };
        if let Some((first, _)) = below.and_then(|rest| rest.split_once('/')) {
            dirs.insert(first.to_string());
        }
    }

    VirtualListing {
        files,
        dirs: dirs.into_iter().collect(),
    }
}

/// Find the file entry whose normalized path is `path`.
pub(crate) fn find_file(entries: &[ArchiveEntry], path: &str) -> Result<usize> {
    let wanted = normalize_inner_path(path);
    entries
        .iter()
        .position(|e| e.kind == EntryKind::File && e.path == wanted)
        .ok_or_else(|| Error::NotFound(format!("no entry '{wanted}' in archive")))
}
