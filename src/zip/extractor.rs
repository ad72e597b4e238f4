use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Upper bound on the output buffer reserved up front from the header size.
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Decodes entry contents from a parsed archive.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all records of the central directory
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Decompress an entry fully into memory and verify its checksum.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            bail!("'{}' is encrypted", entry.file_name);
        }

        let data_offset = self.parser.data_offset(entry).await?;
        let compressed = self
            .parser
            .reader()
            .read_at(data_offset, entry.compressed_size as usize)
            .await?;

        let expected = entry.clone();
        tokio::task::spawn_blocking(move || decode(&expected, compressed))
            .await
            .context("Decompression task failed")?
    }
}

fn decode(entry: &ZipFileEntry, compressed: Vec<u8>) -> Result<Vec<u8>> {
    let data = match entry.compression_method {
        CompressionMethod::Stored => compressed,
        CompressionMethod::Deflate => {
            // Header sizes are untrusted: reserve a bounded amount, and stop
            // decoding one byte past the declared size so the check below fails
            let declared = usize::try_from(entry.uncompressed_size).unwrap_or(usize::MAX);
            let mut out = Vec::with_capacity(declared.min(MAX_PREALLOCATION));
            DeflateDecoder::new(compressed.as_slice())
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut out)
                .with_context(|| format!("Corrupt deflate stream in '{}'", entry.file_name))?;
            out
        }
        CompressionMethod::Unknown(_) => bail!(
            "Unsupported compression method for '{}': {}",
            entry.file_name,
            entry.compression_method
        ),
    };

    if data.len() as u64 != entry.uncompressed_size {
        bail!(
            "Size mismatch for '{}': expected {} bytes, got {}",
            entry.file_name,
            entry.uncompressed_size,
            data.len()
        );
    }

    let mut crc = Crc::new();
    crc.update(&data);
    if crc.sum() != entry.crc32 {
        bail!("CRC mismatch for '{}'", entry.file_name);
    }

    Ok(data)
}
