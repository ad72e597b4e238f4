//! ZIP archive parsing and extraction.
//!
//! - [`structures`]: ZIP format records (EOCD, ZIP64 records, file headers)
//! - [`parser`]: central directory parsing over any [`ReadAt`](crate::io::ReadAt) source
//! - [`extractor`]: entry decoding (STORED and DEFLATE) with CRC-32 checks
//!
//! The central directory is read once, from the end of the file, so an
//! archive can be indexed without touching the entry data.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
