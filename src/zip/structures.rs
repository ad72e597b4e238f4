use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Unknown(id) => write!(f, "method {id}"),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug)]
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        // Skip the two disk numbers; multi-disk archives are not supported
        let mut cursor = Cursor::new(&data[8..Self::SIZE]);
        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any saturated field means the real value lives in the ZIP64 record.
    pub fn needs_zip64(&self) -> bool {
        self.disk_entries == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }

    pub fn location(&self) -> CentralDirectoryLocation {
        CentralDirectoryLocation {
            offset: u64::from(self.cd_offset),
            size: u64::from(self.cd_size),
            entries: u64::from(self.total_entries),
        }
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64Locator;

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    /// Returns the offset of the ZIP64 EOCD record.
    pub fn parse(data: &[u8]) -> Result<u64> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory Locator");
        }
        let mut cursor = Cursor::new(&data[8..16]);
        Ok(cursor.read_u64::<LittleEndian>()?)
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EndOfCentralDirectory;

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn parse(data: &[u8]) -> Result<CentralDirectoryLocation> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory");
        }

        // Fixed part: size(8) made_by(2) needed(2) disk(4) cd_disk(4) disk_entries(8)
        let mut cursor = Cursor::new(&data[32..Self::MIN_SIZE]);
        let entries = cursor.read_u64::<LittleEndian>()?;
        let size = cursor.read_u64::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;
        Ok(CentralDirectoryLocation {
            offset,
            size,
            entries,
        })
    }
}

/// Where the central directory lives and how many records it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryLocation {
    pub offset: u64,
    pub size: u64,
    pub entries: u64,
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Host systems from the upper byte of "version made by"
const HOST_MSDOS: u8 = 0;
const HOST_UNIX: u8 = 3;
const HOST_NTFS: u8 = 10;
const HOST_VFAT: u8 = 14;
const HOST_OSX: u8 = 19;

const MSDOS_DIR_ATTR: u32 = 0x10;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_DIR: u32 = 0o040000;

/// One record of the central directory.
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    /// Name as stored, including a trailing `/` for directory records
    pub file_name: String,
    pub version_made_by: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attrs: u32,
    pub lfh_offset: u64,
}

impl ZipFileEntry {
    /// Directory-ness from the record metadata: a trailing slash, or the
    /// directory bit of the host's attribute encoding.
    pub fn is_directory(&self) -> bool {
        if self.file_name.ends_with('/') {
            return true;
        }
        match (self.version_made_by >> 8) as u8 {
            HOST_MSDOS | HOST_NTFS | HOST_VFAT => self.external_attrs & MSDOS_DIR_ATTR != 0,
            HOST_UNIX | HOST_OSX => {
                let mode = self.external_attrs >> 16;
                mode & UNIX_FILE_TYPE_MASK == UNIX_DIR
            }
            _ => false,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x0001 != 0
    }

    /// The name with any trailing slash removed.
    pub fn normalized_name(&self) -> &str {
        self.file_name.trim_end_matches('/')
    }
}
