//! One listing/read interface over plain directories and archive contents.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

use crate::archive::EntryReader;
use crate::cache::ArchiveCache;
use crate::error::{Error, Result};
use crate::natsort;
use crate::resolver::{PathResolver, ResolvedPath};

/// Response shape of every browse request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualListing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

impl VirtualListing {
    /// Put both lists in natural order.
    pub fn sort(&mut self) {
        natsort::sort(&mut self.files);
        natsort::sort(&mut self.dirs);
    }
}

/// Which entries a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Every file and directory, as served by `/list/`
    All,
    /// Only files with an image extension; directories are dropped
    ImagesOnly,
}

/// Extension whitelist applied in [`ListMode::ImagesOnly`].
#[derive(Debug, Clone)]
pub struct ImageFilter {
    extensions: Vec<String>,
    case_sensitive: bool,
}

/// Extensions kept by the default image filter.
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpeg", ".jpg", ".gif", ".bmp"];

impl ImageFilter {
    /// Filter on [`IMAGE_EXTENSIONS`], matching exactly when `case_sensitive`
    /// and ignoring ASCII case otherwise.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            case_sensitive,
        }
    }

    /// Whether extensions must match exactly.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether `name` ends in a whitelisted extension.
    ///
    /// The extension is everything from the last `.`, so `.png` and
    /// `a.tar.png` qualify while `png` does not.
    pub fn matches(&self, name: &str) -> bool {
        let Some(dot) = name.rfind('.') else {
            return false;
        };
        let ext = &name[dot..];
        self.extensions.iter().any(|allowed| {
            if self.case_sensitive {
                ext == allowed
            } else {
                ext.eq_ignore_ascii_case(allowed)
            }
        })
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Browsing entry point: resolves request paths, dispatches to the
/// filesystem or to a cached archive, filters and orders the result.
pub struct VirtualFs {
    resolver: PathResolver,
    cache: Arc<ArchiveCache>,
    images: ImageFilter,
}

impl VirtualFs {
    /// Assemble the browsing layer from its injected parts.
    pub fn new(resolver: PathResolver, cache: Arc<ArchiveCache>, images: ImageFilter) -> Self {
        Self {
            resolver,
            cache,
            images,
        }
    }

    /// The served root directory.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// The archive cache backing in-archive requests.
    pub fn cache(&self) -> &Arc<ArchiveCache> {
        &self.cache
    }

    /// List the location named by a request path.
    pub async fn list(&self, request: &str, mode: ListMode) -> Result<VirtualListing> {
        let mut listing = match self.resolver.resolve(request)? {
            ResolvedPath::Directory(dir) => read_fs_dir(&dir).await?,
            ResolvedPath::InArchive { archive, inner } => {
                let handle = self.cache.get_or_open(&archive).await?;
                handle.list_directory(&inner)
            }
        };

        if mode == ListMode::ImagesOnly {
            listing.dirs.clear();
            listing.files.retain(|name| self.images.matches(name));
        }
        listing.sort();

        tracing::debug!(
            "Listed '{}': {} files, {} dirs",
            request,
            listing.files.len(),
            listing.dirs.len()
        );
        Ok(listing)
    }

    /// Open a file inside an archive. The request must contain `//`.
    ///
    /// Returns the entry's reader and its in-archive path.
    pub async fn open_archive_file(&self, request: &str) -> Result<(EntryReader, String)> {
        let (archive, inner) = self.resolver.resolve_archive_entry(request)?;
        let handle = self.cache.get_or_open(&archive).await?;
        let reader = handle.open_file(&inner).await?;
        Ok((reader, inner))
    }
}

/// Read a plain directory, following symlinks to classify entries.
async fn read_fs_dir(dir: &Path) -> Result<VirtualListing> {
    let mut read_dir = fs::read_dir(dir).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("{}", dir.display())),
        _ => Error::Io(e),
    })?;

    let mut listing = VirtualListing::default();
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = match fs::metadata(entry.path()).await {
            Ok(metadata) => metadata.is_dir(),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };
        if is_dir {
            listing.dirs.push(name);
        } else {
            listing.files.push(name);
        }
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_filter_case_insensitive_by_default() {
        let filter = ImageFilter::default();
        assert!(filter.matches("a.png"));
        assert!(filter.matches("c.GIF"));
        assert!(filter.matches("photo.JpEg"));
        assert!(!filter.matches("b.txt"));
        assert!(!filter.matches("png"));
        assert!(!filter.matches("a.png.txt"));
    }

    #[test]
    fn image_filter_case_sensitive() {
        let filter = ImageFilter::new(true);
        assert!(filter.matches("a.png"));
        assert!(!filter.matches("c.GIF"));
    }

    #[test]
    fn listing_sorts_both_lists() {
        let mut listing = VirtualListing {
            files: vec!["p10.png".into(), "p2.png".into()],
            dirs: vec!["vol10".into(), "vol9".into()],
        };
        listing.sort();
        assert_eq!(listing.files, vec!["p2.png", "p10.png"]);
        assert_eq!(listing.dirs, vec!["vol9", "vol10"]);
    }

    #[tokio::test]
    async fn lists_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page10.png"), b"").unwrap();
        std::fs::write(dir.path().join("page2.png"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let vfs = VirtualFs::new(
            PathResolver::new(dir.path()),
            Arc::new(ArchiveCache::default()),
            ImageFilter::default(),
        );

        let all = vfs.list("", ListMode::All).await.unwrap();
        assert_eq!(all.files, vec!["notes.txt", "page2.png", "page10.png"]);
        assert_eq!(all.dirs, vec!["sub"]);

        let images = vfs.list("/", ListMode::ImagesOnly).await.unwrap();
        assert_eq!(images.files, vec!["page2.png", "page10.png"]);
        assert!(images.dirs.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = VirtualFs::new(
            PathResolver::new(dir.path()),
            Arc::new(ArchiveCache::default()),
            ImageFilter::default(),
        );
        assert!(matches!(
            vfs.list("nope", ListMode::All).await,
            Err(Error::NotFound(_))
        ));
    }
}
