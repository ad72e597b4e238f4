//! Archive format detection from magic bytes.

use std::fmt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::Result;

/// Container formats with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const MAGIC_LEN: u64 = 8;

impl ArchiveFormat {
    /// Read the head of `path` and classify it.
    ///
    /// Returns `Ok(None)` for content that matches no backend, including
    /// files too short to carry a signature.
    pub async fn sniff(path: &Path) -> Result<Option<Self>> {
        let file = fs::File::open(path).await?;
        let mut head = Vec::with_capacity(MAGIC_LEN as usize);
        file.take(MAGIC_LEN).read_to_end(&mut head).await?;
        Ok(Self::detect_by_magic(&head))
    }

    pub fn detect_by_magic(head: &[u8]) -> Option<Self> {
        match head {
            // Local file header, empty archive EOCD, or spanned marker
            [0x50, 0x4B, 0x03, 0x04, ..]
            | [0x50, 0x4B, 0x05, 0x06, ..]
            | [0x50, 0x4B, 0x07, 0x08, ..] => Some(Self::Zip),
            _ if head.starts_with(SEVEN_ZIP_MAGIC) => Some(Self::SevenZip),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => f.write_str("zip"),
            Self::SevenZip => f.write_str("7z"),
        }
    }
}
