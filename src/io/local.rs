use super::ReadAt;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Local file reader with random access support
///
/// Reads are positional, so one reader can serve concurrent requests
/// for different entries of the same archive.
pub struct LocalFileReader {
    file: Arc<File>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            size,
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        if offset.saturating_add(len as u64) > self.size {
            bail!(
                "Read of {} bytes at offset {} is past the end of the file ({} bytes)",
                len,
                offset,
                self.size
            );
        }

        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || read_exact_at(&file, offset, len))
            .await
            .context("Blocking read task failed")?
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, offset: u64, len: usize) -> Result<Vec<u8>> {
    use std::os::unix::fs::FileExt;

    let mut buf = vec![0u8; len];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

#[cfg(windows)]
fn read_exact_at(file: &File, offset: u64, len: usize) -> Result<Vec<u8>> {
    use std::os::windows::fs::FileExt;

    // seek_read moves the file cursor, but every read here is positional
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            bail!("Unexpected end of file at offset {}", offset + filled as u64);
        }
        filled += n;
    }
    Ok(buf)
}

#[cfg(not(any(unix, windows)))]
fn read_exact_at(file: &File, offset: u64, len: usize) -> Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = file;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
