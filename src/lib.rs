//! # arcbrowse
//!
//! Browse a directory tree, including the contents of the archives inside
//! it, through one HTTP API.
//!
//! A request path is relative to the served root. A double slash steps into
//! an archive, so `comics/vol1.zip//chapter2/01.png` names a file inside
//! `comics/vol1.zip`. Listings look the same whether they come from a plain
//! directory or from an archive, and are returned in natural order
//! (`page2` before `page10`).
//!
//! ## Features
//!
//! - Zip archives, read with random access (STORED and DEFLATE, ZIP64)
//! - 7z archives, read through an external `7z` program
//! - Archive format sniffed from content, not the extension
//! - Opened archives cached with an LRU bound; concurrent requests for the
//!   same archive share a single open
//! - Image-only listings for picture viewers
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use arcbrowse::{ArchiveCache, ImageFilter, ListMode, PathResolver, VirtualFs};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let vfs = VirtualFs::new(
//!         PathResolver::new("/srv/comics"),
//!         Arc::new(ArchiveCache::default()),
//!         ImageFilter::default(),
//!     );
//!
//!     let listing = vfs.list("vol1.zip//chapter2", ListMode::ImagesOnly).await?;
//!     for file in &listing.files {
//!         println!("{}", file);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod error;
pub mod io;
pub mod natsort;
pub mod resolver;
pub mod server;
pub mod vfs;
pub mod zip;

pub use archive::{ArchiveBackend, ArchiveEntry, ArchiveFormat, BackendOptions, EntryKind, EntryReader};
pub use cache::{ArchiveCache, ArchiveHandle};
pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt};
pub use resolver::{PathResolver, ResolvedPath};
pub use server::{AppState, Server, create_router};
pub use vfs::{ImageFilter, ListMode, VirtualFs, VirtualListing};
