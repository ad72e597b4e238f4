use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ArchiveBackend, ArchiveEntry, ArchiveFormat, EntryKind, EntryReader, find_file};
use crate::error::{Error, Result};
use crate::io::LocalFileReader;
use crate::zip::{ZipExtractor, ZipFileEntry};

/// Random-access zip backend.
///
/// The central directory is parsed once when the archive is opened; entry
/// data is read positionally and decoded per request.
pub struct ZipArchive {
    path: PathBuf,
    extractor: ZipExtractor<LocalFileReader>,
    /// Central directory records, index-aligned with `entries`
    records: Vec<ZipFileEntry>,
    entries: Vec<ArchiveEntry>,
}

impl ZipArchive {
    /// Parse the central directory of the zip file at `path`.
    ///
    /// Any parse or I/O failure is reported as [`Error::BackendOpen`].
    pub async fn open(path: &Path) -> Result<Self> {
        let open_err = |source| Error::BackendOpen {
            path: path.to_path_buf(),
            source,
        };

        let reader = LocalFileReader::new(path).map_err(open_err)?;
        let extractor = ZipExtractor::new(Arc::new(reader));
        let records = extractor.list_files().await.map_err(open_err)?;

        let entries = records
            .iter()
            .map(|record| {
                let kind = if record.is_directory() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                ArchiveEntry::new(record.normalized_name(), kind)
            })
            .collect();

        tracing::info!("Indexed zip {:?}: {} entries", path, records.len());
        Ok(Self {
            path: path.to_path_buf(),
            extractor,
            records,
            entries,
        })
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArchiveBackend for ZipArchive {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    async fn open_file(&self, path: &str) -> Result<EntryReader> {
        let index = find_file(&self.entries, path)?;
        let record = &self.records[index];

        let data = self
            .extractor
            .extract_to_memory(record)
            .await
            .map_err(|source| Error::EntryRead {
                entry: self.entries[index].path.clone(),
                source,
            })?;

        Ok(Box::new(Cursor::new(data)))
    }
}
