//! Central directory parser.
//!
//! ZIP files are read from the end:
//! 1. Locate the End of Central Directory (EOCD) record
//! 2. Follow the ZIP64 locator when the EOCD fields are saturated
//! 3. Read the whole central directory in one positional read
//! 4. Per entry, resolve the local file header to find where data starts

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Low-level ZIP parser, generic over the data source.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find the EOCD record and its offset in the file.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            bail!("Not a valid ZIP file: too short");
        }

        // Common case: no archive comment, the record ends the file
        let tail_offset = self.size - eocd_size;
        let tail = self.reader.read_at(tail_offset, EndOfCentralDirectory::SIZE).await?;
        if tail.starts_with(EndOfCentralDirectory::SIGNATURE) && tail[20..22] == [0, 0] {
            return Ok((EndOfCentralDirectory::parse(&tail)?, tail_offset));
        }

        // Otherwise scan backwards through the window a comment can occupy
        let window = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let window_start = self.size - window;
        let buf = self.reader.read_at(window_start, window as usize).await?;

        let last_candidate = buf.len() - EndOfCentralDirectory::SIZE;
        for i in (0..=last_candidate).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if i + EndOfCentralDirectory::SIZE + comment_len == buf.len() {
                let eocd = EndOfCentralDirectory::parse(&buf[i..])?;
                return Ok((eocd, window_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file: end of central directory not found")
    }

    /// Resolve the central directory location, following ZIP64 records when needed.
    pub async fn central_directory_location(&self) -> Result<CentralDirectoryLocation> {
        let (eocd, eocd_offset) = self.find_eocd().await?;
        if !eocd.needs_zip64() {
            return Ok(eocd.location());
        }

        let locator_offset = eocd_offset
            .checked_sub(Zip64Locator::SIZE as u64)
            .context("ZIP64 locator is missing")?;
        let locator = self.reader.read_at(locator_offset, Zip64Locator::SIZE).await?;
        let eocd64_offset = Zip64Locator::parse(&locator)?;

        let record = self
            .reader
            .read_at(eocd64_offset, Zip64EndOfCentralDirectory::MIN_SIZE)
            .await?;
        Zip64EndOfCentralDirectory::parse(&record)
    }

    /// Parse every record of the central directory.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let location = self.central_directory_location().await?;
        if location.offset.saturating_add(location.size) > self.size {
            bail!("Central directory extends past the end of the file");
        }

        let data = self
            .reader
            .read_at(location.offset, location.size as usize)
            .await?;

        // Entry count is untrusted, cap the preallocation by what could fit
        let capacity = (location.entries as usize).min(data.len() / CDFH_MIN_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        let mut cursor = Cursor::new(data.as_slice());
        for index in 0..location.entries {
            let entry = parse_cdfh(&mut cursor)
                .with_context(|| format!("Corrupt central directory record #{index}"))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Offset of an entry's compressed data, past its local file header.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let lfh = self.reader.read_at(entry.lfh_offset, LFH_SIZE).await?;
        if !lfh.starts_with(LFH_SIGNATURE) {
            bail!("Invalid Local File Header for '{}'", entry.file_name);
        }

        // The local name and extra field may differ in length from the central record
        let mut cursor = Cursor::new(&lfh[26..LFH_SIZE]);
        let name_len = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_len = u64::from(cursor.read_u16::<LittleEndian>()?);

        Ok(entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!("Invalid Central Directory File Header");
    }

    let version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let mut uncompressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let name_len = cursor.read_u16::<LittleEndian>()?;
    let extra_len = cursor.read_u16::<LittleEndian>()?;
    let comment_len = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

    let mut name = vec![0u8; name_len as usize];
    cursor.read_exact(&mut name)?;
    let file_name = String::from_utf8_lossy(&name).into_owned();

    let mut extra = vec![0u8; extra_len as usize];
    cursor.read_exact(&mut extra)?;
    if let Some(zip64) = find_extra_field(&extra, ZIP64_EXTRA_ID) {
        // Only the saturated header fields are present, in this order
        let mut fields = Cursor::new(zip64);
        if uncompressed_size == u64::from(u32::MAX) {
            uncompressed_size = fields.read_u64::<LittleEndian>()?;
        }
        if compressed_size == u64::from(u32::MAX) {
            compressed_size = fields.read_u64::<LittleEndian>()?;
        }
        if lfh_offset == u64::from(u32::MAX) {
            lfh_offset = fields.read_u64::<LittleEndian>()?;
        }
    }

    cursor.set_position(cursor.position() + u64::from(comment_len));

    Ok(ZipFileEntry {
        file_name,
        version_made_by,
        flags,
        compression_method: CompressionMethod::from(compression_method),
        crc32,
        compressed_size,
        uncompressed_size,
        external_attrs,
        lfh_offset,
    })
}

/// Find the payload of an extra field block by header id.
fn find_extra_field(mut extra: &[u8], id: u16) -> Option<&[u8]> {
    while extra.len() >= 4 {
        let header = u16::from_le_bytes([extra[0], extra[1]]);
        let size = u16::from_le_bytes([extra[2], extra[3]]) as usize;
        let body = extra.get(4..4 + size)?;
        if header == id {
            return Some(body);
        }
        extra = &extra[4 + size..];
    }
    None
}
